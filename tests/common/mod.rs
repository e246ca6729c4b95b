// tests/common/mod.rs
//
// Shared helpers: in-process fake upstreams and small builders.
#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use chrono::{DateTime, Utc};
use publish_sla_monitor::model::{Content, ContentEvent, Environment, MetricConfig};

/// Serve `router` on an ephemeral local port; returns `http://127.0.0.1:<port>`.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake upstream");
    });
    format!("http://{addr}")
}

pub fn metric(alias: &str, endpoint: &str, threshold: u64, granularity: u64) -> MetricConfig {
    MetricConfig {
        alias: alias.to_string(),
        endpoint: endpoint.to_string(),
        threshold_seconds: threshold,
        granularity,
        content_types: vec!["Article".to_string()],
        health: None,
        feed: None,
    }
}

pub fn environment(name: &str, read_url: &str) -> Environment {
    Environment {
        name: name.to_string(),
        read_url: read_url.to_string(),
        s3_url: None,
        username: None,
        password: None,
    }
}

pub fn event(id: &str, tid: &str, at: DateTime<Utc>) -> ContentEvent {
    ContentEvent {
        content: Content {
            id: id.to_string(),
            content_type: "Article".to_string(),
        },
        transaction_id: tid.to_string(),
        publish_timestamp: at,
        marked_deleted: false,
    }
}

/// Poll `cond` every 20ms until it holds or `within` elapses.
pub async fn eventually<F: Fn() -> bool>(within: Duration, cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}
