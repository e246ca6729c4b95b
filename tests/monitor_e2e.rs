// tests/monitor_e2e.rs
//
// Whole process wiring: config -> feeds -> scheduler -> checks -> aggregator.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde_json::json;

use publish_sla_monitor::aggregator::MetricDestination;
use publish_sla_monitor::model::PublishMetric;
use publish_sla_monitor::{AppConfig, Monitor};

#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<PublishMetric>>,
}

#[async_trait]
impl MetricDestination for Recording {
    async fn send(&self, metric: &PublishMetric) -> Result<()> {
        self.seen.lock().unwrap().push(metric.clone());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recording"
    }
}

async fn fake_environment() -> String {
    let router = Router::new()
        .route(
            "/content/notifications",
            get(|| async {
                Json(json!({
                    "notifications": [{
                        "id": "http://www.example.com/things/abc",
                        "publishReference": "tid_1",
                        "lastModified": Utc::now().to_rfc3339()
                    }],
                    "links": [{"href": "http://upstream/content/notifications?since=2025-09-06T10:00:00Z"}]
                }))
            }),
        )
        .route(
            "/content/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "abc" {
                    (StatusCode::OK, Json(json!({"uuid": id, "publishReference": "tid_1"}))).into_response()
                } else {
                    StatusCode::NOT_FOUND.into_response()
                }
            }),
        );
    common::spawn_server(router).await
}

fn config(base: &str) -> AppConfig {
    let toml = format!(
        r#"
probe_timeout_secs = 2

[[environments]]
name = "prod-eu"
read_url = "{base}"

[[metrics]]
alias = "content"
endpoint = "/content/"
threshold_seconds = 4
granularity = 2
content_types = ["Article"]

[[metrics]]
alias = "notifications"
endpoint = "/content/notifications"
threshold_seconds = 4
granularity = 2
content_types = ["Article"]
"#
    );
    AppConfig::parse(&toml, "toml").expect("valid config")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_is_verified_through_checks_and_feeds() {
    let base = fake_environment().await;
    let recording = Arc::new(Recording::default());
    let destinations: Vec<Arc<dyn MetricDestination>> = vec![recording.clone()];
    let monitor = Monitor::start(&config(&base), destinations).expect("monitor");

    let feeds = monitor.registry.snapshot();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].alias, "notifications");

    let registry = monitor.registry.clone();
    let warmed = common::eventually(Duration::from_secs(5), || {
        registry
            .get("prod-eu", "notifications")
            .is_some_and(|f| !f.notifications_for("abc").is_empty())
    })
    .await;
    assert!(warmed, "pull feed should ingest the upstream notification");

    let started = monitor
        .scheduler
        .schedule(&common::event("abc", "tid_1", Utc::now()));
    assert_eq!(started, 2);

    let reported = common::eventually(Duration::from_secs(6), || {
        recording.seen.lock().unwrap().len() == 2
    })
    .await;
    assert!(reported, "both tasks should report");

    let seen = recording.seen.lock().unwrap().clone();
    assert!(seen.iter().all(|m| m.success && m.platform == "prod-eu"));
    let mut aliases: Vec<_> = seen.iter().map(|m| m.metric_alias.clone()).collect();
    aliases.sort();
    assert_eq!(aliases, vec!["content", "notifications"]);

    monitor.shutdown();
    assert!(registry.snapshot().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unpublished_content_fails_after_threshold() {
    let base = fake_environment().await;
    let recording = Arc::new(Recording::default());
    let destinations: Vec<Arc<dyn MetricDestination>> = vec![recording.clone()];
    let monitor = Monitor::start(&config(&base), destinations).expect("monitor");

    let started = monitor
        .scheduler
        .schedule(&common::event("never-published", "tid_x", Utc::now()));
    assert_eq!(started, 2);

    let reported = common::eventually(Duration::from_secs(8), || {
        recording.seen.lock().unwrap().len() == 2
    })
    .await;
    assert!(reported);
    assert!(recording
        .seen
        .lock()
        .unwrap()
        .iter()
        .all(|m| !m.success && m.result_label() == "fail"));

    monitor.shutdown();
}
