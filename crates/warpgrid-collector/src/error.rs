//! Error types for metric collection.

use thiserror::Error;

/// Result type alias for collector operations.
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Errors that can occur while talking to a metrics backend.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The backend address is malformed or the backend is unreachable.
    #[error("connection error: {0}")]
    Connection(String),

    /// A worker was requested before any backend was configured.
    #[error("no metrics backend configured")]
    NotConnected,

    #[error("unknown metric type: {0}")]
    UnknownMetricType(String),

    /// The query failed or returned something unusable.
    #[error("collection error: {0}")]
    Collection(String),
}
