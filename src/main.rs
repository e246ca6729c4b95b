//! Publish SLA Monitor: binary entrypoint.
//! Boots the feeds, aggregator and scheduler, then serves the Axum router.

use publish_sla_monitor::{app, metrics::Metrics, AppConfig, Monitor};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs; `RUST_LOG` overrides the default filter.
/// The Shuttle runtime may already own the global subscriber, so this is best-effort.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("publish_sla_monitor=info,publish_sla=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let metrics = Metrics::init()?;
    let cfg = AppConfig::load_default()?;
    tracing::info!(
        environments = cfg.environments.len(),
        metrics = cfg.metrics.len(),
        "monitor config loaded"
    );

    let monitor = Monitor::start(&cfg, app::default_destinations())?;
    let router = monitor.router().merge(metrics.router());

    Ok(router.into())
}
