use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe every series we emit.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "verification_tasks_started_total",
            "Verification tasks spawned by the scheduler."
        );
        describe_counter!(
            "verification_tasks_skipped_total",
            "Metric/environment combinations rejected at task creation."
        );
        describe_counter!(
            "verification_outcomes_total",
            "Terminal verification outcomes by alias, platform and result."
        );
        describe_counter!(
            "publish_sla_results_total",
            "Outcomes recorded by the Prometheus destination."
        );
        describe_histogram!(
            "verification_visible_seconds",
            "Upper bound of the SLA window in which content became visible."
        );
        describe_counter!("check_probe_errors_total", "Probe transport/decode errors.");
        describe_counter!("feed_polls_total", "Pull feed poll cycles.");
        describe_counter!("feed_poll_errors_total", "Pull feed cycles skipped on error.");
        describe_counter!(
            "feed_notifications_ingested_total",
            "Notifications appended to a feed ledger."
        );
        describe_gauge!("feed_ledger_entries", "Content ids tracked by a feed ledger.");
        describe_gauge!("feed_connected", "1 when the feed's last poll/stream is healthy.");
        describe_counter!("push_feed_reconnects_total", "Push feed reconnect attempts.");
        describe_counter!(
            "destination_send_failures_total",
            "Outcome sends a destination rejected."
        );
    });
}
