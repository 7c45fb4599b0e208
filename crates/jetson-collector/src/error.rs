//! Collector error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up collection.
///
/// Per-reading problems never surface here; they are dropped inside the
/// poll cycle.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("hardware source has no stdout pipe")]
    MissingStdout,

    #[error("invalid stats pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("metric registry error: {0}")]
    Metrics(#[from] jetson_metrics::MetricsError),
}

pub type CollectorResult<T> = Result<T, CollectorError>;
