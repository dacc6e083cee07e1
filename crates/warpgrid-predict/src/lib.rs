//! warpgrid-predict — forecasting replica counts ahead of load.
//!
//! Each scaling target owns one `Predictor`. The predictor keeps a bounded
//! history of metric samples, delegates training and prediction to an
//! external algorithm unit through an `AlgorithmRunner`, and returns a
//! replica-count forecast.
//!
//! # Architecture
//!
//! ```text
//! PredictorFactory ── model.kind ──► Box<dyn Predictor>
//!                                      ├── GruPredictor    (gru/train.py, gru/predict.py)
//!                                      └── LinearPredictor (linear_regression/linear_regression.py)
//!
//! Predictor
//!   ├── MetricHistory  (FIFO ring buffer)
//!   ├── ReplicaHistory (newest-first after prune)
//!   └── AlgorithmRunner::run(unit, json, timeout)
//!         └── ProcessRunner → child process, killed on timeout
//! ```

pub mod error;
pub mod factory;
pub mod gru;
pub mod history;
pub mod linear;
pub mod predictor;
pub mod protocol;
pub mod runner;

pub use error::{PredictError, PredictResult, RunnerError};
pub use factory::PredictorFactory;
pub use gru::GruPredictor;
pub use history::{MetricHistory, ReplicaHistory};
pub use linear::LinearPredictor;
pub use predictor::{Predictor, PredictorStatus};
pub use protocol::AlgorithmResponse;
pub use runner::{AlgorithmRunner, ProcessRunner};
