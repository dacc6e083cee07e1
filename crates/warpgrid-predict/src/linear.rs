//! Linear-regression predictor.
//!
//! Forecasts the replica count by fitting a line through past replica
//! decisions. There is no model to train: the regression is recomputed by
//! the unit on every prediction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use warpgrid_forecast::{
    LinearConfig, ModelConfig, TYPE_LINEAR, TimestampedMetric, TimestampedReplicas,
};

use crate::error::{PredictError, PredictResult};
use crate::predictor::{Predictor, PredictorCore, PredictorStatus, require_history};
use crate::protocol::{ReplicaPredictRequest, encode};
use crate::runner::AlgorithmRunner;

pub struct LinearPredictor {
    core: PredictorCore,
    unit: PathBuf,
}

impl LinearPredictor {
    pub fn new(
        model: ModelConfig,
        runner: Arc<dyn AlgorithmRunner>,
        algorithms_dir: &Path,
    ) -> Self {
        Self {
            core: PredictorCore::new(model, runner),
            unit: algorithms_dir
                .join("linear_regression")
                .join("linear_regression.py"),
        }
    }

    fn config(&self) -> PredictResult<&LinearConfig> {
        self.core
            .model
            .linear
            .as_ref()
            .ok_or(PredictError::MissingConfig { family: TYPE_LINEAR })
    }

    pub fn replica_history(&self) -> &[TimestampedReplicas] {
        self.core.replicas.as_slice()
    }
}

#[async_trait]
impl Predictor for LinearPredictor {
    fn prepare(&mut self, samples: Vec<TimestampedMetric>) {
        self.core.prepare(samples);
    }

    fn record_replicas(&mut self, entry: TimestampedReplicas) {
        self.core.replicas.push(entry);
    }

    fn prune_history(&mut self) -> PredictResult<()> {
        let history_size = self.config()?.history_size;
        let evicted = self.core.replicas.prune(history_size);
        self.core.metrics.truncate_to(history_size);
        if evicted > 0 {
            debug!(evicted, kept = self.core.replicas.len(), "pruned replica history");
        }
        Ok(())
    }

    async fn train(&mut self) -> PredictResult<()> {
        self.config()?;
        self.core.mark_trained(true);
        Ok(())
    }

    async fn predict(&mut self) -> PredictResult<i32> {
        let config = self.config()?.clone();
        require_history(1, self.core.replicas.len())?;

        let payload = encode(&ReplicaPredictRequest {
            look_ahead: config.look_ahead,
            replica_history: self.core.replicas.as_slice(),
        });
        let response = self.core.invoke(&self.unit, payload).await?;

        debug!(forecast = response.value, "linear prediction");
        Ok(response.value)
    }

    fn identify(&self) -> &'static str {
        TYPE_LINEAR
    }

    fn training_due(&self, _now: DateTime<Utc>) -> bool {
        self.config().is_ok() && !self.core.ready
    }

    fn status(&self) -> PredictorStatus {
        if self.core.is_trained() {
            PredictorStatus::Trained
        } else if self.core.replicas.is_empty() {
            PredictorStatus::Empty
        } else {
            PredictorStatus::Trainable
        }
    }

    fn is_ready(&self) -> bool {
        self.core.ready
    }

    fn history_len(&self) -> usize {
        self.core.metrics.len()
    }
}
