// src/checks/mod.rs
//! Pluggable "has this publish become visible yet" predicates.
//!
//! A check is resolved once per task from the metric alias and then probed
//! on every tick of the verification loop.

pub mod bucket;
pub mod content;
pub mod graph;
pub mod notifications;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TaskError;
use crate::feeds::FeedRegistry;
use crate::model::{Credentials, Environment, MetricConfig, VerificationTask};

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckResult {
    pub finished: bool,
    /// Inconclusive probe: a newer publish was observed for the same content.
    pub skip: bool,
}

impl CheckResult {
    pub const PENDING: Self = Self {
        finished: false,
        skip: false,
    };
    pub const FINISHED: Self = Self {
        finished: true,
        skip: false,
    };
    pub const SKIP: Self = Self {
        finished: false,
        skip: true,
    };
}

#[async_trait]
pub trait EndpointCheck: Send + Sync {
    async fn is_finished(&self, task: &VerificationTask) -> CheckResult;
    fn name(&self) -> &'static str;
}

/// Strategy family selected by metric alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Content,
    Graph,
    Bucket,
    Notifications,
}

impl CheckKind {
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "content" | "enrichedContent" | "lists" | "internal-components" => {
                Some(CheckKind::Content)
            }
            "content-neo4j" | "content-collection-neo4j" | "graph" => Some(CheckKind::Graph),
            "S3" | "s3" => Some(CheckKind::Bucket),
            a if a.contains("notifications") => Some(CheckKind::Notifications),
            _ => None,
        }
    }
}

/// Shared HTTP client for probes; every request carries the client timeout.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("publish-sla-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> reqwest::RequestBuilder {
        let req = self.client.request(method, url);
        match credentials {
            Some(c) => req.basic_auth(&c.username, Some(&c.password)),
            None => req,
        }
    }
}

/// URL of `content_id` under a resolved metric endpoint.
pub fn content_url(endpoint: &str, content_id: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), content_id)
}

fn probe_error(check: &'static str, task: &VerificationTask, error: &dyn std::fmt::Display) {
    counter!("check_probe_errors_total", "check" => check).increment(1);
    tracing::debug!(
        check,
        uuid = %task.content_id,
        tid = %task.transaction_id,
        platform = %task.platform,
        error = %error,
        "probe failed; retrying on next tick"
    );
}

/// Bind the strategy for `metric` in `environment`.
///
/// Notification checks need their feed to be registered already.
pub fn resolve(
    metric: &MetricConfig,
    environment: &Environment,
    probe: &HttpProbe,
    registry: &FeedRegistry,
) -> Result<Arc<dyn EndpointCheck>, TaskError> {
    let kind =
        CheckKind::from_alias(&metric.alias).ok_or_else(|| TaskError::UnknownCheck(metric.alias.clone()))?;
    let credentials = environment.credentials();
    let check: Arc<dyn EndpointCheck> = match kind {
        CheckKind::Content => Arc::new(content::ContentCheck::new(probe.clone(), credentials)),
        CheckKind::Graph => Arc::new(graph::GraphCheck::new(probe.clone(), credentials)),
        CheckKind::Bucket => Arc::new(bucket::BucketCheck::new(probe.clone(), credentials)),
        CheckKind::Notifications => {
            let alias = metric.feed_alias();
            if registry.get(&environment.name, alias).is_none() {
                return Err(TaskError::FeedUnavailable {
                    environment: environment.name.clone(),
                    alias: alias.to_string(),
                });
            }
            Arc::new(notifications::NotificationsCheck::new(
                registry.clone(),
                &environment.name,
                alias,
            ))
        }
    };
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::metric;

    fn env() -> Environment {
        Environment {
            name: "prod-eu".into(),
            read_url: "http://read".into(),
            s3_url: None,
            username: None,
            password: None,
        }
    }

    #[test]
    fn alias_table() {
        assert_eq!(CheckKind::from_alias("content"), Some(CheckKind::Content));
        assert_eq!(CheckKind::from_alias("lists"), Some(CheckKind::Content));
        assert_eq!(CheckKind::from_alias("content-neo4j"), Some(CheckKind::Graph));
        assert_eq!(CheckKind::from_alias("S3"), Some(CheckKind::Bucket));
        assert_eq!(
            CheckKind::from_alias("notifications-push"),
            Some(CheckKind::Notifications)
        );
        assert_eq!(
            CheckKind::from_alias("list-notifications"),
            Some(CheckKind::Notifications)
        );
        assert_eq!(CheckKind::from_alias("annotations"), None);
    }

    #[test]
    fn content_url_has_single_slash() {
        assert_eq!(content_url("http://e/content/", "abc"), "http://e/content/abc");
        assert_eq!(content_url("http://e/content", "abc"), "http://e/content/abc");
    }

    #[test]
    fn resolve_rejects_unknown_alias_and_missing_feed() {
        let probe = HttpProbe::from_client(reqwest::Client::new());
        let reg = FeedRegistry::new();
        let err = resolve(&metric("annotations", 60, 6), &env(), &probe, &reg)
            .err()
            .unwrap();
        assert_eq!(err, TaskError::UnknownCheck("annotations".into()));

        let err = resolve(&metric("notifications", 60, 6), &env(), &probe, &reg)
            .err()
            .unwrap();
        assert!(matches!(err, TaskError::FeedUnavailable { .. }));

        let ok = resolve(&metric("content", 60, 6), &env(), &probe, &reg).unwrap();
        assert_eq!(ok.name(), "content");
    }
}
