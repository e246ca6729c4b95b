// src/aggregator.rs
use anyhow::Result;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::model::PublishMetric;

/// A sink for verification outcomes. Fire-and-forget from the aggregator's view.
#[async_trait::async_trait]
pub trait MetricDestination: Send + Sync {
    async fn send(&self, metric: &PublishMetric) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan-in stream every verification task reports on.
pub fn result_channel() -> (UnboundedSender<PublishMetric>, UnboundedReceiver<PublishMetric>) {
    mpsc::unbounded_channel()
}

/// Forwards each outcome to every destination, one detached send per destination.
pub struct Aggregator {
    destinations: Vec<Arc<dyn MetricDestination>>,
}

impl Aggregator {
    pub fn new(destinations: Vec<Arc<dyn MetricDestination>>) -> Self {
        Self { destinations }
    }

    /// Consume `results` until every sender is gone.
    pub async fn run(self, mut results: UnboundedReceiver<PublishMetric>) {
        while let Some(metric) = results.recv().await {
            self.dispatch(metric);
        }
        tracing::info!("result stream closed; aggregator exiting");
    }

    pub fn spawn(self, results: UnboundedReceiver<PublishMetric>) -> JoinHandle<()> {
        tokio::spawn(self.run(results))
    }

    fn dispatch(&self, metric: PublishMetric) {
        let metric = Arc::new(metric);
        for destination in &self.destinations {
            let destination = destination.clone();
            let metric = metric.clone();
            tokio::spawn(async move {
                if let Err(e) = destination.send(&metric).await {
                    counter!("destination_send_failures_total", "destination" => destination.name())
                        .increment(1);
                    tracing::warn!(
                        destination = destination.name(),
                        uuid = %metric.content_id,
                        error = ?e,
                        "destination send failed"
                    );
                }
            });
        }
    }
}
