// src/destinations.rs
use anyhow::Result;
use async_trait::async_trait;
use metrics::{counter, histogram};

use crate::aggregator::MetricDestination;
use crate::model::PublishMetric;

/// Writes every outcome as one structured log line on the `publish_sla` target.
pub struct LogDestination;

#[async_trait]
impl MetricDestination for LogDestination {
    async fn send(&self, m: &PublishMetric) -> Result<()> {
        if m.success {
            tracing::info!(
                target: "publish_sla",
                uuid = %m.content_id,
                tid = %m.transaction_id,
                platform = %m.platform,
                alias = %m.metric_alias,
                endpoint = %m.endpoint,
                publish_date = %m.publish_timestamp.to_rfc3339(),
                interval_lower = m.observed_interval.lower,
                interval_upper = m.observed_interval.upper,
                result = m.result_label(),
                "publish visible"
            );
        } else {
            tracing::warn!(
                target: "publish_sla",
                uuid = %m.content_id,
                tid = %m.transaction_id,
                platform = %m.platform,
                alias = %m.metric_alias,
                endpoint = %m.endpoint,
                publish_date = %m.publish_timestamp.to_rfc3339(),
                result = m.result_label(),
                "publish not visible within SLA"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Records outcomes through the `metrics` facade (scraped on `/metrics`).
pub struct PrometheusDestination;

#[async_trait]
impl MetricDestination for PrometheusDestination {
    async fn send(&self, m: &PublishMetric) -> Result<()> {
        counter!(
            "publish_sla_results_total",
            "alias" => m.metric_alias.clone(),
            "platform" => m.platform.clone(),
            "result" => m.result_label()
        )
        .increment(1);
        if m.success {
            histogram!(
                "verification_visible_seconds",
                "alias" => m.metric_alias.clone(),
                "platform" => m.platform.clone()
            )
            .record(m.observed_interval.upper as f64);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}
