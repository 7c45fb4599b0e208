//! Error types for the metric registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors returned by [`MetricRegistry`](crate::MetricRegistry) operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("metric already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("metric {name} expects {expected} label value(s), got {got}")]
    LabelMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("metric {name} is not a {expected}")]
    WrongKind { name: String, expected: &'static str },

    #[error("invalid metric or label name: {0}")]
    InvalidName(String),
}
