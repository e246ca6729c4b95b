// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;

// Verification core: strategies, state machine, fan-out/fan-in
pub mod checks;
pub mod scheduler;
pub mod verify;
pub mod aggregator;
pub mod destinations;

// Notification feeds (pull + push) and their ledgers
pub mod feeds;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{Aggregator, MetricDestination};
pub use crate::app::Monitor;
pub use crate::config::AppConfig;
pub use crate::error::TaskError;
pub use crate::feeds::{Feed, FeedRegistry};
pub use crate::model::{ContentEvent, PublishMetric, VerificationTask};
pub use crate::scheduler::Scheduler;
