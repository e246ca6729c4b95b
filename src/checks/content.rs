// src/checks/content.rs
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use super::{content_url, probe_error, CheckResult, EndpointCheck, HttpProbe};
use crate::model::{Credentials, VerificationTask};

/// Pulls the publish reference out of a read response.
pub(crate) type ReferenceExtractor = fn(&Value) -> Option<&str>;

/// GET the content and compare its `publishReference` with the task's
/// transaction id. For deletions a 404 counts as visible.
pub(crate) async fn reference_check(
    check: &'static str,
    probe: &HttpProbe,
    credentials: Option<&Credentials>,
    task: &VerificationTask,
    extract: ReferenceExtractor,
) -> CheckResult {
    let url = content_url(&task.endpoint, &task.content_id);
    let resp = match probe.request(Method::GET, &url, credentials).send().await {
        Ok(r) => r,
        Err(e) => {
            probe_error(check, task, &e);
            return CheckResult::PENDING;
        }
    };

    let status = resp.status();
    if status == StatusCode::NOT_FOUND && task.marked_deleted {
        return CheckResult::FINISHED;
    }
    if status != StatusCode::OK {
        tracing::debug!(check, uuid = %task.content_id, %status, "content not visible yet");
        return CheckResult::PENDING;
    }

    let body: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => {
            probe_error(check, task, &e);
            return CheckResult::PENDING;
        }
    };
    match extract(&body) {
        Some(reference) if reference == task.transaction_id => CheckResult::FINISHED,
        _ => CheckResult::PENDING,
    }
}

fn top_level_reference(body: &Value) -> Option<&str> {
    body.get("publishReference")?.as_str()
}

/// Direct content-store read.
pub struct ContentCheck {
    probe: HttpProbe,
    credentials: Option<Credentials>,
}

impl ContentCheck {
    pub fn new(probe: HttpProbe, credentials: Option<Credentials>) -> Self {
        Self { probe, credentials }
    }
}

#[async_trait]
impl EndpointCheck for ContentCheck {
    async fn is_finished(&self, task: &VerificationTask) -> CheckResult {
        reference_check(
            self.name(),
            &self.probe,
            self.credentials.as_ref(),
            task,
            top_level_reference,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "content"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_top_level_reference() {
        let body = json!({"uuid": "abc", "publishReference": "tid_1"});
        assert_eq!(top_level_reference(&body), Some("tid_1"));
        assert_eq!(top_level_reference(&json!({"uuid": "abc"})), None);
        assert_eq!(top_level_reference(&json!({"publishReference": 7})), None);
    }
}
