// src/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TaskError;

/// The piece of content a publish event refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Content {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// A publish event that already passed upstream validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentEvent {
    pub content: Content,
    pub transaction_id: String,
    pub publish_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub marked_deleted: bool,
}

/// Basic-auth pair used against read environments and feeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One read replica of the content platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub read_url: String,
    /// Object-storage base URL; bucket checks fall back to `read_url` without it.
    #[serde(default)]
    pub s3_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Environment {
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some(Credentials {
                username: u.clone(),
                password: p.clone(),
            }),
            _ => None,
        }
    }

    /// `read_url` joined with a metric path, with exactly one `/` between them.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.read_url, path)
    }

    /// Object-storage base when configured, otherwise `read_url`.
    pub fn bucket_url_for(&self, path: &str) -> String {
        join_url(self.s3_url.as_deref().unwrap_or(&self.read_url), path)
    }
}

pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let path = path.trim();
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, path.trim_start_matches('/'))
}

/// Per-metric SLA definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricConfig {
    /// Also selects the check strategy (`content`, `S3`, `notifications-push`, ...).
    pub alias: String,
    /// Path appended to the environment base URL.
    pub endpoint: String,
    pub threshold_seconds: u64,
    pub granularity: u64,
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub health: Option<String>,
    /// Feed alias for notification-based metrics; defaults to `alias`.
    #[serde(default)]
    pub feed: Option<String>,
}

impl MetricConfig {
    pub fn applies_to(&self, content_type: &str) -> bool {
        self.content_types.iter().any(|t| t == content_type)
    }

    pub fn feed_alias(&self) -> &str {
        self.feed.as_deref().unwrap_or(&self.alias)
    }

    /// `threshold / granularity` in whole seconds; zero or unset inputs are rejected.
    pub fn check_interval(&self) -> Result<Duration, TaskError> {
        if self.threshold_seconds == 0 {
            return Err(TaskError::ZeroThreshold(self.alias.clone()));
        }
        if self.granularity == 0 {
            return Err(TaskError::ZeroGranularity(self.alias.clone()));
        }
        let secs = self.threshold_seconds / self.granularity;
        if secs == 0 {
            return Err(TaskError::IntervalTooSmall {
                alias: self.alias.clone(),
                threshold: self.threshold_seconds,
                granularity: self.granularity,
            });
        }
        Ok(Duration::from_secs(secs))
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_seconds)
    }
}

/// One in-flight verification attempt for `(content, environment, metric)`.
///
/// Threshold, granularity and the derived interval are fixed here and never
/// change for the lifetime of the task.
#[derive(Debug, Clone)]
pub struct VerificationTask {
    pub content_id: String,
    pub transaction_id: String,
    pub publish_timestamp: DateTime<Utc>,
    pub platform: String,
    metric: MetricConfig,
    pub endpoint: String,
    pub marked_deleted: bool,
    check_interval: Duration,
}

impl VerificationTask {
    pub fn new(
        event: &ContentEvent,
        platform: &str,
        metric: MetricConfig,
        endpoint: String,
    ) -> Result<Self, TaskError> {
        let check_interval = metric.check_interval()?;
        Ok(Self {
            content_id: event.content.id.clone(),
            transaction_id: event.transaction_id.clone(),
            publish_timestamp: event.publish_timestamp,
            platform: platform.to_string(),
            metric,
            endpoint,
            marked_deleted: event.marked_deleted,
            check_interval,
        })
    }

    pub fn metric(&self) -> &MetricConfig {
        &self.metric
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.publish_timestamp + chrono::Duration::seconds(self.metric.threshold_seconds as i64)
    }

    pub fn into_outcome(self, success: bool, interval: Interval, superseded: bool) -> PublishMetric {
        PublishMetric {
            content_id: self.content_id,
            transaction_id: self.transaction_id,
            success,
            superseded,
            observed_interval: interval,
            publish_timestamp: self.publish_timestamp,
            platform: self.platform,
            metric_alias: self.metric.alias,
            endpoint: self.endpoint,
        }
    }
}

/// Sub-window of the SLA, in seconds since publish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Interval {
    pub lower: u64,
    pub upper: u64,
}

/// Terminal outcome of one verification task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishMetric {
    pub content_id: String,
    pub transaction_id: String,
    pub success: bool,
    /// Set when a newer publish of the same content was seen before the deadline.
    #[serde(default)]
    pub superseded: bool,
    pub observed_interval: Interval,
    pub publish_timestamp: DateTime<Utc>,
    pub platform: String,
    pub metric_alias: String,
    pub endpoint: String,
}

impl PublishMetric {
    /// Label used by destinations: `ok`, `fail` or `superseded`.
    pub fn result_label(&self) -> &'static str {
        match (self.success, self.superseded) {
            (true, _) => "ok",
            (false, true) => "superseded",
            (false, false) => "fail",
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn metric(alias: &str, threshold: u64, granularity: u64) -> MetricConfig {
        MetricConfig {
            alias: alias.to_string(),
            endpoint: "/content/".to_string(),
            threshold_seconds: threshold,
            granularity,
            content_types: vec!["Article".to_string()],
            health: None,
            feed: None,
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

    pub fn task(metric: MetricConfig, at: DateTime<Utc>) -> VerificationTask {
        VerificationTask::new(
            &event("uuid-1", "tid_1", at),
            "prod-eu",
            metric,
            "http://localhost/content/".to_string(),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn interval_is_threshold_over_granularity() {
        let m = metric("content", 20, 2);
        assert_eq!(m.check_interval().unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn zero_threshold_or_granularity_is_rejected() {
        assert!(matches!(
            metric("content", 0, 2).check_interval(),
            Err(TaskError::ZeroThreshold(_))
        ));
        assert!(matches!(
            metric("content", 20, 0).check_interval(),
            Err(TaskError::ZeroGranularity(_))
        ));
        assert!(matches!(
            metric("content", 3, 5).check_interval(),
            Err(TaskError::IntervalTooSmall { .. })
        ));
    }

    #[test]
    fn deadline_is_publish_plus_threshold() {
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let t = task(metric("content", 120, 4), t0);
        assert_eq!(t.deadline(), t0 + chrono::Duration::seconds(120));
        assert_eq!(t.check_interval(), Duration::from_secs(30));
        assert_eq!(t.metric().threshold_seconds, 120);
        assert_eq!(t.metric().granularity, 4);
    }

    #[test]
    fn content_type_matching_is_exact() {
        let m = metric("content", 20, 2);
        assert!(m.applies_to("Article"));
        assert!(!m.applies_to("article"));
        assert!(!m.applies_to("List"));
    }

    #[test]
    fn urls_join_with_single_slash() {
        assert_eq!(join_url("http://env/", "/content/"), "http://env/content/");
        assert_eq!(join_url("http://env", "content"), "http://env/content");
        assert_eq!(join_url("http://env/", ""), "http://env");
        let env = Environment {
            name: "prod".into(),
            read_url: "http://read".into(),
            s3_url: Some("http://bucket/".into()),
            username: None,
            password: None,
        };
        assert_eq!(env.bucket_url_for("/"), "http://bucket/");
        assert_eq!(env.url_for("/lists/"), "http://read/lists/");
    }

    #[test]
    fn result_labels() {
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let ok = task(metric("content", 20, 2), t0).into_outcome(true, Interval::default(), false);
        let sup = task(metric("content", 20, 2), t0).into_outcome(false, Interval::default(), true);
        let fail =
            task(metric("content", 20, 2), t0).into_outcome(false, Interval::default(), false);
        assert_eq!(ok.result_label(), "ok");
        assert_eq!(sup.result_label(), "superseded");
        assert_eq!(fail.result_label(), "fail");
    }
}
