// src/app.rs
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::aggregator::{result_channel, Aggregator, MetricDestination};
use crate::api::{create_router, AppState};
use crate::checks::HttpProbe;
use crate::config::monitor::AppConfig;
use crate::destinations::{LogDestination, PrometheusDestination};
use crate::feeds::FeedRegistry;
use crate::scheduler::Scheduler;

/// The wired process: feeds running, aggregator consuming, scheduler ready.
pub struct Monitor {
    pub registry: FeedRegistry,
    pub scheduler: Arc<Scheduler>,
    aggregator: JoinHandle<()>,
}

pub fn default_destinations() -> Vec<Arc<dyn MetricDestination>> {
    vec![Arc::new(LogDestination), Arc::new(PrometheusDestination)]
}

impl Monitor {
    /// Start feeds and the aggregator. Must be called inside a tokio runtime.
    pub fn start(cfg: &AppConfig, destinations: Vec<Arc<dyn MetricDestination>>) -> Result<Self> {
        let registry = FeedRegistry::new();
        let settings = cfg.feed_settings();
        for env in &cfg.environments {
            let n = registry.sync_environment(env, &cfg.metrics, &settings);
            info!(environment = %env.name, feeds = n, "environment configured");
        }

        let probe = HttpProbe::new(cfg.probe_timeout(), cfg.connect_timeout())
            .context("building probe http client")?;
        let (tx, rx) = result_channel();
        let aggregator = Aggregator::new(destinations).spawn(rx);
        let scheduler = Arc::new(Scheduler::new(
            cfg.environments.clone(),
            cfg.metrics.clone(),
            registry.clone(),
            probe,
            tx,
        ));

        Ok(Self {
            registry,
            scheduler,
            aggregator,
        })
    }

    pub fn router(&self) -> Router {
        create_router(AppState {
            scheduler: self.scheduler.clone(),
            registry: self.registry.clone(),
        })
    }

    /// Stop every feed and detach the aggregator.
    pub fn shutdown(self) {
        self.registry.stop_all();
        drop(self.aggregator);
    }
}
