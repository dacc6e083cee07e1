//! Error types for algorithm invocation and prediction.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for predictor operations.
pub type PredictResult<T> = Result<T, PredictError>;

/// Errors raised while running an external algorithm unit.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start algorithm {}: {source}", unit.display())]
    Spawn {
        unit: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("algorithm {} timed out after {timeout:?}", unit.display())]
    Timeout { unit: PathBuf, timeout: Duration },

    /// The unit exited abnormally. `output` holds whatever diagnostics it printed.
    #[error("algorithm {} failed ({status}): {output}", unit.display())]
    Execution {
        unit: PathBuf,
        status: String,
        output: String,
    },

    #[error("i/o with algorithm {} failed: {source}", unit.display())]
    Io {
        unit: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by predictors and the predictor factory.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("no {family} configuration provided for model")]
    MissingConfig { family: &'static str },

    #[error("insufficient history: need {required} samples, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("unsupported model type: {0}")]
    UnsupportedFamily(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// The unit answered with something that is not a valid response.
    #[error("malformed algorithm response: {0}")]
    Deserialize(#[from] serde_json::Error),
}
