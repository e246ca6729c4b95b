// src/checks/notifications.rs
use async_trait::async_trait;

use super::{CheckResult, EndpointCheck};
use crate::feeds::{FeedRegistry, Notification};
use crate::model::VerificationTask;

/// Looks for the task's publish in the ledger of a subscribed feed.
pub struct NotificationsCheck {
    registry: FeedRegistry,
    environment: String,
    feed_alias: String,
}

impl NotificationsCheck {
    pub fn new(registry: FeedRegistry, environment: &str, feed_alias: &str) -> Self {
        Self {
            registry,
            environment: environment.to_string(),
            feed_alias: feed_alias.to_string(),
        }
    }
}

/// Decide from the notifications seen so far for the task's content.
///
/// - deletions: any notification at all means visible;
/// - a matching publish reference means visible, whatever its timestamp;
/// - a newer notification with another reference means superseded (skip);
/// - older or undatable notifications mean "not yet".
pub fn evaluate(task: &VerificationTask, seen: &[Notification]) -> CheckResult {
    if task.marked_deleted {
        return if seen.is_empty() {
            CheckResult::PENDING
        } else {
            CheckResult::FINISHED
        };
    }

    let mut superseded = false;
    for n in seen {
        if n.publish_reference == task.transaction_id {
            return CheckResult::FINISHED;
        }
        match n.last_modified_at() {
            Some(ts) if ts > task.publish_timestamp => superseded = true,
            Some(_) => {}
            None => {
                tracing::debug!(
                    uuid = %task.content_id,
                    last_modified = %n.last_modified,
                    "unparsable lastModified ignored"
                );
            }
        }
    }

    if superseded {
        CheckResult::SKIP
    } else {
        CheckResult::PENDING
    }
}

#[async_trait]
impl EndpointCheck for NotificationsCheck {
    async fn is_finished(&self, task: &VerificationTask) -> CheckResult {
        let Some(feed) = self.registry.get(&self.environment, &self.feed_alias) else {
            tracing::debug!(
                environment = %self.environment,
                feed = %self.feed_alias,
                "feed not available; not finished"
            );
            return CheckResult::PENDING;
        };
        evaluate(task, &feed.notifications_for(&task.content_id))
    }

    fn name(&self) -> &'static str {
        "notifications"
    }
}
