//! The predictor contract and the state every family shares.
//!
//! A predictor belongs to exactly one scaling target and is driven by that
//! target's control loop, one call at a time:
//!
//! ```text
//! prepare(samples)   append freshly drained samples
//! train()            when training_due and the training window is full
//! predict()          forecast from the newest prediction window
//! prune_history()    bound memory once the full window is not needed
//! ```
//!
//! Whether a predictor is ready is advisory. `predict` never refuses to
//! run because the model has not been trained; the control loop decides
//! whether to trust the result.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use warpgrid_forecast::{ModelConfig, TimestampedMetric, TimestampedReplicas};

use crate::error::{PredictError, PredictResult};
use crate::history::{MetricHistory, ReplicaHistory};
use crate::protocol::{self, AlgorithmResponse};
use crate::runner::AlgorithmRunner;

/// Lifecycle of a predictor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorStatus {
    /// No samples yet.
    Empty,
    /// Collecting samples, not enough to train.
    Accumulating,
    /// Enough samples to train, never trained.
    Trainable,
    /// The last train attempt succeeded.
    Trained,
}

impl fmt::Display for PredictorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Accumulating => "accumulating",
            Self::Trainable => "trainable",
            Self::Trained => "trained",
        };
        f.write_str(s)
    }
}

#[async_trait]
pub trait Predictor: Send {
    /// Append freshly collected samples to the metric history.
    fn prepare(&mut self, samples: Vec<TimestampedMetric>);

    /// Remember a replica-count decision for families that forecast from them.
    fn record_replicas(&mut self, entry: TimestampedReplicas);

    /// Bound the histories to this family's window.
    fn prune_history(&mut self) -> PredictResult<()>;

    /// Train or refresh the external model from the current history.
    async fn train(&mut self) -> PredictResult<()>;

    /// Forecast a replica count from the current history.
    async fn predict(&mut self) -> PredictResult<i32>;

    /// Family tag, e.g. `"GRU"`.
    fn identify(&self) -> &'static str;

    /// Whether the control loop should call `train` at `now`.
    fn training_due(&self, now: DateTime<Utc>) -> bool;

    fn status(&self) -> PredictorStatus;

    /// Readiness flag last reported by the model.
    fn is_ready(&self) -> bool;

    /// Number of metric samples currently held.
    fn history_len(&self) -> usize;
}

/// State and plumbing shared by every family.
pub(crate) struct PredictorCore {
    pub(crate) model: ModelConfig,
    pub(crate) metrics: MetricHistory,
    pub(crate) replicas: ReplicaHistory,
    pub(crate) ready: bool,
    pub(crate) last_trained: Option<DateTime<Utc>>,
    /// The most recent train attempt reached the unit and failed.
    pub(crate) train_failed: bool,
    runner: Arc<dyn AlgorithmRunner>,
}

impl PredictorCore {
    pub(crate) fn new(model: ModelConfig, runner: Arc<dyn AlgorithmRunner>) -> Self {
        Self {
            model,
            metrics: MetricHistory::new(),
            replicas: ReplicaHistory::new(),
            ready: false,
            last_trained: None,
            train_failed: false,
            runner,
        }
    }

    pub(crate) fn prepare(&mut self, samples: Vec<TimestampedMetric>) {
        let added = samples.len();
        self.metrics.extend(samples);
        debug!(added, history = self.metrics.len(), "prepared samples");
    }

    /// Run `unit` with an encoded request and parse its response.
    ///
    /// Runner errors are logged and returned unchanged.
    pub(crate) async fn invoke(
        &self,
        unit: &Path,
        payload: Vec<u8>,
    ) -> PredictResult<AlgorithmResponse> {
        let timeout = self.model.timeout();
        let output = match self.runner.run(unit, &payload, timeout).await {
            Ok(output) => output,
            Err(e) => {
                warn!(unit = %unit.display(), error = %e, "algorithm invocation failed");
                return Err(e.into());
            }
        };
        Ok(protocol::decode(&output)?)
    }

    pub(crate) fn mark_trained(&mut self, ready: bool) {
        self.ready = ready;
        self.last_trained = Some(Utc::now());
        self.train_failed = false;
    }

    /// Whether the last train attempt succeeded.
    pub(crate) fn is_trained(&self) -> bool {
        self.last_trained.is_some() && !self.train_failed
    }

    pub(crate) fn record_readiness(&mut self, response: &AlgorithmResponse) {
        if let Some(trained) = response.trained {
            debug!(trained, "model readiness reported");
            self.ready = trained;
        }
    }
}

/// Fail with `InsufficientHistory` unless `available >= required`.
pub(crate) fn require_history(required: usize, available: usize) -> PredictResult<()> {
    if available < required {
        return Err(PredictError::InsufficientHistory {
            required,
            available,
        });
    }
    Ok(())
}
