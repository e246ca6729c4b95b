// src/checks/bucket.rs
use async_trait::async_trait;
use reqwest::Method;

use super::{content_url, probe_error, CheckResult, EndpointCheck, HttpProbe};
use crate::model::{Credentials, VerificationTask};

/// Object-storage existence probe: finished once the object answers 2xx.
pub struct BucketCheck {
    probe: HttpProbe,
    credentials: Option<Credentials>,
}

impl BucketCheck {
    pub fn new(probe: HttpProbe, credentials: Option<Credentials>) -> Self {
        Self { probe, credentials }
    }
}

#[async_trait]
impl EndpointCheck for BucketCheck {
    async fn is_finished(&self, task: &VerificationTask) -> CheckResult {
        let url = content_url(&task.endpoint, &task.content_id);
        match self
            .probe
            .request(Method::HEAD, &url, self.credentials.as_ref())
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => CheckResult::FINISHED,
            Ok(resp) => {
                tracing::debug!(uuid = %task.content_id, status = %resp.status(), "object not in bucket yet");
                CheckResult::PENDING
            }
            Err(e) => {
                probe_error(self.name(), task, &e);
                CheckResult::PENDING
            }
        }
    }

    fn name(&self) -> &'static str {
        "bucket"
    }
}
