// src/checks/graph.rs
use async_trait::async_trait;
use serde_json::Value;

use super::content::reference_check;
use super::{CheckResult, EndpointCheck, HttpProbe};
use crate::model::{Credentials, VerificationTask};

/// Graph reads return either a flat node or `{ "properties": { .. } }`.
fn graph_reference(body: &Value) -> Option<&str> {
    body.get("publishReference")
        .or_else(|| body.get("properties")?.get("publishReference"))?
        .as_str()
}

/// Same contract as the content check, against the graph-backed read service.
pub struct GraphCheck {
    probe: HttpProbe,
    credentials: Option<Credentials>,
}

impl GraphCheck {
    pub fn new(probe: HttpProbe, credentials: Option<Credentials>) -> Self {
        Self { probe, credentials }
    }
}

#[async_trait]
impl EndpointCheck for GraphCheck {
    async fn is_finished(&self, task: &VerificationTask) -> CheckResult {
        reference_check(
            self.name(),
            &self.probe,
            self.credentials.as_ref(),
            task,
            graph_reference,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "graph"
    }
}
