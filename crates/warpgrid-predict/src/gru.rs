//! Recurrent-network (GRU) predictor.
//!
//! Training sends the whole history to the `gru/train.py` unit; prediction
//! sends the newest `predict_size` samples to `gru/predict.py`. The model
//! itself lives in the unit, this side only keeps history and bookkeeping.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use warpgrid_forecast::{
    GruConfig, ModelConfig, TYPE_GRU, TimestampedMetric, TimestampedReplicas,
};

use crate::error::{PredictError, PredictResult};
use crate::predictor::{Predictor, PredictorCore, PredictorStatus, require_history};
use crate::protocol::{PredictRequest, TrainRequest, encode};
use crate::runner::AlgorithmRunner;

pub struct GruPredictor {
    core: PredictorCore,
    train_unit: PathBuf,
    predict_unit: PathBuf,
}

impl GruPredictor {
    pub fn new(
        model: ModelConfig,
        runner: Arc<dyn AlgorithmRunner>,
        algorithms_dir: &Path,
    ) -> Self {
        let units = algorithms_dir.join("gru");
        Self {
            core: PredictorCore::new(model, runner),
            train_unit: units.join("train.py"),
            predict_unit: units.join("predict.py"),
        }
    }

    fn config(&self) -> PredictResult<&GruConfig> {
        self.core
            .model
            .gru
            .as_ref()
            .ok_or(PredictError::MissingConfig { family: TYPE_GRU })
    }

    /// The metric history, oldest first.
    pub fn history(&mut self) -> &[TimestampedMetric] {
        self.core.metrics.as_slice()
    }

    pub fn last_trained(&self) -> Option<DateTime<Utc>> {
        self.core.last_trained
    }
}

#[async_trait]
impl Predictor for GruPredictor {
    fn prepare(&mut self, samples: Vec<TimestampedMetric>) {
        self.core.prepare(samples);
    }

    fn record_replicas(&mut self, entry: TimestampedReplicas) {
        self.core.replicas.push(entry);
    }

    fn prune_history(&mut self) -> PredictResult<()> {
        let predict_size = self.config()?.predict_size;
        let evicted = self.core.metrics.truncate_to(predict_size);
        // Replica decisions are kept for diagnostics only; bound them the same way.
        self.core.replicas.prune(predict_size);
        if evicted > 0 {
            debug!(evicted, kept = self.core.metrics.len(), "pruned metric history");
        }
        Ok(())
    }

    async fn train(&mut self) -> PredictResult<()> {
        let config = self.config()?.clone();
        require_history(config.train_size, self.core.metrics.len())?;

        let payload = encode(&TrainRequest {
            look_ahead: config.look_ahead,
            train_history: self.core.metrics.as_slice(),
        });
        let response = match self.core.invoke(&self.train_unit, payload).await {
            Ok(response) => response,
            Err(e) => {
                self.core.train_failed = true;
                return Err(e);
            }
        };
        // A unit that does not report readiness is taken to be ready.
        self.core.mark_trained(response.trained.unwrap_or(true));

        info!(
            samples = self.core.metrics.len(),
            ready = self.core.ready,
            "gru model trained"
        );
        Ok(())
    }

    async fn predict(&mut self) -> PredictResult<i32> {
        let config = self.config()?.clone();
        require_history(config.predict_size, self.core.metrics.len())?;

        let payload = encode(&PredictRequest {
            look_ahead: config.look_ahead,
            predict_history: self.core.metrics.latest(config.predict_size),
        });
        let response = self.core.invoke(&self.predict_unit, payload).await?;
        self.core.record_readiness(&response);

        debug!(forecast = response.value, "gru prediction");
        Ok(response.value)
    }

    fn identify(&self) -> &'static str {
        TYPE_GRU
    }

    fn training_due(&self, now: DateTime<Utc>) -> bool {
        let Ok(config) = self.config() else {
            return false;
        };
        if self.core.train_failed {
            return true;
        }
        match (self.core.last_trained, config.update_interval) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(at), Some(interval)) => now
                .signed_duration_since(at)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= interval),
        }
    }

    fn status(&self) -> PredictorStatus {
        if self.core.is_trained() {
            return PredictorStatus::Trained;
        }
        let len = self.core.metrics.len();
        match self.config() {
            _ if len == 0 => PredictorStatus::Empty,
            Ok(config) if len >= config.train_size => PredictorStatus::Trainable,
            _ => PredictorStatus::Accumulating,
        }
    }

    fn is_ready(&self) -> bool {
        self.core.ready
    }

    fn history_len(&self) -> usize {
        self.core.metrics.len()
    }
}
