// src/scheduler.rs
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::checks::{self, CheckKind, EndpointCheck, HttpProbe};
use crate::error::TaskError;
use crate::feeds::FeedRegistry;
use crate::model::{ContentEvent, Environment, MetricConfig, PublishMetric, VerificationTask};
use crate::verify::run_verification;

/// Fans a validated content event out into one verification task per
/// applicable `(metric, environment)` pair.
pub struct Scheduler {
    environments: Vec<Environment>,
    metrics: Vec<MetricConfig>,
    registry: FeedRegistry,
    probe: HttpProbe,
    results: UnboundedSender<PublishMetric>,
}

impl Scheduler {
    pub fn new(
        environments: Vec<Environment>,
        metrics: Vec<MetricConfig>,
        registry: FeedRegistry,
        probe: HttpProbe,
        results: UnboundedSender<PublishMetric>,
    ) -> Self {
        Self {
            environments,
            metrics,
            registry,
            probe,
            results,
        }
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Build a task and bind its check. Any failure skips the combination.
    pub fn prepare(
        &self,
        event: &ContentEvent,
        metric: &MetricConfig,
        environment: &Environment,
    ) -> Result<(VerificationTask, Arc<dyn EndpointCheck>), TaskError> {
        let endpoint = match CheckKind::from_alias(&metric.alias) {
            Some(CheckKind::Bucket) => environment.bucket_url_for(&metric.endpoint),
            _ => environment.url_for(&metric.endpoint),
        };
        reqwest::Url::parse(&endpoint).map_err(|e| TaskError::InvalidEndpoint {
            url: endpoint.clone(),
            reason: e.to_string(),
        })?;
        let check = checks::resolve(metric, environment, &self.probe, &self.registry)?;
        let task = VerificationTask::new(event, &environment.name, metric.clone(), endpoint)?;
        Ok((task, check))
    }

    /// Spawn every applicable task for `event`; returns how many started.
    ///
    /// Must be called inside a tokio runtime.
    pub fn schedule(&self, event: &ContentEvent) -> usize {
        let mut started = 0usize;
        for metric in &self.metrics {
            if !metric.applies_to(&event.content.content_type) {
                continue;
            }
            for environment in &self.environments {
                match self.prepare(event, metric, environment) {
                    Ok((task, check)) => {
                        tokio::spawn(run_verification(task, check, self.results.clone()));
                        counter!("verification_tasks_started_total").increment(1);
                        started += 1;
                    }
                    Err(e) => {
                        counter!("verification_tasks_skipped_total").increment(1);
                        tracing::warn!(
                            uuid = %event.content.id,
                            tid = %event.transaction_id,
                            platform = %environment.name,
                            alias = %metric.alias,
                            error = %e,
                            "verification skipped"
                        );
                    }
                }
            }
        }
        tracing::info!(
            uuid = %event.content.id,
            tid = %event.transaction_id,
            content_type = %event.content.content_type,
            tasks = started,
            "publish scheduled for verification"
        );
        started
    }
}
