// src/error.rs
use thiserror::Error;

/// Reasons a `(metric, environment)` combination is skipped at creation time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("metric `{0}` has a zero threshold")]
    ZeroThreshold(String),

    #[error("metric `{0}` has a zero granularity")]
    ZeroGranularity(String),

    #[error("metric `{alias}`: threshold {threshold}s / granularity {granularity} is below one second")]
    IntervalTooSmall {
        alias: String,
        threshold: u64,
        granularity: u64,
    },

    #[error("invalid endpoint `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("no check registered for metric alias `{0}`")]
    UnknownCheck(String),

    #[error("feed `{alias}` is not running for environment `{environment}`")]
    FeedUnavailable { environment: String, alias: String },
}
