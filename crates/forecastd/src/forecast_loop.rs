//! Per-target forecast loop.
//!
//! Drives one worker and one predictor on a fixed interval and logs the
//! forecast. Forecasts are not applied to any workload; the latest one is
//! recorded as the target's replica decision so families that regress on
//! replica history have something to work with.

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use warpgrid_collector::Worker;
use warpgrid_forecast::TimestampedReplicas;
use warpgrid_predict::{PredictError, Predictor};

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The predictor produced a replica forecast.
    Forecast(i32),
    /// Not enough history for a prediction yet.
    Accumulating { samples: usize },
}

pub struct ForecastLoop {
    name: String,
    worker: Box<dyn Worker>,
    predictor: Box<dyn Predictor>,
    /// Replica count recorded on every tick: the last forecast, or the
    /// configured initial count before the first one.
    replicas: i32,
}

impl ForecastLoop {
    pub fn new(
        name: impl Into<String>,
        worker: Box<dyn Worker>,
        predictor: Box<dyn Predictor>,
        initial_replicas: i32,
    ) -> Self {
        Self {
            name: name.into(),
            worker,
            predictor,
            replicas: initial_replicas,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn replicas(&self) -> i32 {
        self.replicas
    }

    /// Metric samples the predictor currently holds.
    pub fn history_len(&self) -> usize {
        self.predictor.history_len()
    }

    /// Collect, feed the predictor, train if due, and forecast.
    pub async fn tick(&mut self) -> anyhow::Result<TickOutcome> {
        let now = Utc::now();

        self.worker
            .collect()
            .await
            .with_context(|| format!("collecting {}", self.worker.metric_type()))?;
        let samples = self.worker.drain();
        debug!(scaling_target = %self.name, samples = samples.len(), "drained samples");

        self.predictor.prepare(samples);
        self.predictor
            .record_replicas(TimestampedReplicas::new(self.replicas, now));

        let mut train_failed = false;
        if self.predictor.training_due(now) {
            match self.predictor.train().await {
                Ok(()) => info!(
                    scaling_target = %self.name,
                    family = self.predictor.identify(),
                    "model trained"
                ),
                Err(PredictError::InsufficientHistory { required, available }) => debug!(
                    scaling_target = %self.name,
                    required,
                    available,
                    "filling training window"
                ),
                Err(e) => {
                    warn!(
                        scaling_target = %self.name,
                        error = %e,
                        "training failed, forecasting with the current model"
                    );
                    train_failed = true;
                }
            }
        }

        // Keep the full window while a training run is still pending. A
        // failed run retries on a later tick from a freshly filled window.
        if train_failed || !self.predictor.training_due(now) {
            self.predictor
                .prune_history()
                .context("pruning history failed")?;
        }

        match self.predictor.predict().await {
            Ok(forecast) => {
                self.replicas = forecast;
                info!(
                    scaling_target = %self.name,
                    forecast,
                    status = %self.predictor.status(),
                    ready = self.predictor.is_ready(),
                    "replica forecast"
                );
                Ok(TickOutcome::Forecast(forecast))
            }
            Err(PredictError::InsufficientHistory { .. }) => Ok(TickOutcome::Accumulating {
                samples: self.predictor.history_len(),
            }),
            Err(e) => Err(e).context("prediction failed"),
        }
    }

    /// Tick every `interval` until shutdown. A failed tick is logged and the
    /// next one retries from scratch.
    pub async fn run(
        &mut self,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            scaling_target = %self.name,
            family = self.predictor.identify(),
            interval_secs = interval.as_secs(),
            "forecast loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.tick().await {
                        Ok(TickOutcome::Forecast(_)) => {}
                        Ok(TickOutcome::Accumulating { samples }) => {
                            debug!(scaling_target = %self.name, samples, "accumulating history");
                        }
                        Err(e) => {
                            warn!(
                                scaling_target = %self.name,
                                error = %format!("{e:#}"),
                                "forecast tick failed"
                            );
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!(scaling_target = %self.name, "forecast loop shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};

    use warpgrid_collector::{
        CollectorError, CollectorResult, MetricCollector, PrometheusCollector, QueryBackend,
        avg_node_cpu_usage,
    };
    use warpgrid_forecast::{GruConfig, LinearConfig, ModelConfig, TimestampedMetric};
    use warpgrid_predict::{AlgorithmRunner, PredictorFactory, RunnerError};

    /// Each query returns one fresh sample, or fails when told to.
    struct CountingBackend {
        next: Mutex<i64>,
        fail: bool,
    }

    #[async_trait]
    impl QueryBackend for CountingBackend {
        async fn instant_query(
            &self,
            _query: &str,
            _at: DateTime<Utc>,
        ) -> CollectorResult<Vec<TimestampedMetric>> {
            if self.fail {
                return Err(CollectorError::Collection("backend down".into()));
            }
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Ok(vec![TimestampedMetric::new(
                *next as f64,
                Utc.timestamp_opt(*next, 0).unwrap(),
            )])
        }
    }

    /// Train units answer trained, predict units answer 4. With
    /// `broken_train` every train unit exits non-zero instead.
    #[derive(Default)]
    struct FixedRunner {
        units: Mutex<Vec<String>>,
        broken_train: bool,
    }

    impl FixedRunner {
        fn count(&self, unit: &str) -> usize {
            self.units.lock().unwrap().iter().filter(|u| *u == unit).count()
        }
    }

    #[async_trait]
    impl AlgorithmRunner for FixedRunner {
        async fn run(
            &self,
            unit: &Path,
            _payload: &[u8],
            _timeout: Duration,
        ) -> Result<Vec<u8>, RunnerError> {
            let name = unit.file_name().unwrap().to_string_lossy().into_owned();
            if self.broken_train && name == "train.py" {
                self.units.lock().unwrap().push(name);
                return Err(RunnerError::Execution {
                    unit: unit.to_path_buf(),
                    status: "exit status: 1".into(),
                    output: "ModuleNotFoundError: torch".into(),
                });
            }
            let reply = if name == "train.py" {
                r#"{"value": 0, "trained": true}"#
            } else {
                r#"{"value": 4}"#
            };
            self.units.lock().unwrap().push(name);
            Ok(reply.as_bytes().to_vec())
        }
    }

    fn worker(fail: bool) -> Box<dyn Worker> {
        PrometheusCollector::new()
            .with_backend(Arc::new(CountingBackend {
                next: Mutex::new(0),
                fail,
            }))
            .create_worker(&avg_node_cpu_usage())
            .unwrap()
    }

    fn gru_model() -> ModelConfig {
        ModelConfig::gru(GruConfig {
            train_size: 3,
            predict_size: 2,
            look_ahead: Duration::from_secs(60),
            update_interval: None,
        })
    }

    #[tokio::test]
    async fn gru_loop_accumulates_trains_and_forecasts() {
        let runner = Arc::new(FixedRunner::default());
        let factory = PredictorFactory::new(runner.clone(), "algorithms");
        let predictor = factory.new_predictor(&gru_model()).unwrap();
        let mut forecast = ForecastLoop::new("default/api", worker(false), predictor, 1);

        assert_eq!(
            forecast.tick().await.unwrap(),
            TickOutcome::Accumulating { samples: 1 }
        );
        // Two samples: enough to predict, not enough to train.
        assert_eq!(forecast.tick().await.unwrap(), TickOutcome::Forecast(4));
        // Third sample fills the training window; history is pruned after.
        assert_eq!(forecast.tick().await.unwrap(), TickOutcome::Forecast(4));
        assert_eq!(forecast.replicas(), 4);

        let units = runner.units.lock().unwrap().clone();
        assert_eq!(units, vec!["predict.py", "train.py", "predict.py"]);
    }

    #[tokio::test]
    async fn failing_training_still_bounds_history_and_forecasts() {
        let runner = Arc::new(FixedRunner {
            broken_train: true,
            ..Default::default()
        });
        let factory = PredictorFactory::new(runner.clone(), "algorithms");
        let predictor = factory.new_predictor(&gru_model()).unwrap();
        let mut forecast = ForecastLoop::new("default/api", worker(false), predictor, 1);

        for tick in 1..=50 {
            let outcome = forecast.tick().await.unwrap();
            assert!(forecast.history_len() <= 3, "tick {tick}: {}", forecast.history_len());
            if tick >= 2 {
                assert_eq!(outcome, TickOutcome::Forecast(4), "tick {tick}");
            }
        }

        // Every tick from the second on forecasts, and training keeps retrying.
        assert_eq!(runner.count("predict.py"), 49);
        assert!(runner.count("train.py") >= 24);
        assert_eq!(forecast.replicas(), 4);
    }

    #[tokio::test]
    async fn linear_loop_uses_recorded_replicas() {
        let runner = Arc::new(FixedRunner::default());
        let factory = PredictorFactory::new(runner.clone(), "algorithms");
        let model = ModelConfig::linear(LinearConfig {
            look_ahead: Duration::from_secs(60),
            history_size: 4,
        });
        let predictor = factory.new_predictor(&model).unwrap();
        let mut forecast = ForecastLoop::new("default/worker", worker(false), predictor, 2);

        assert_eq!(forecast.tick().await.unwrap(), TickOutcome::Forecast(4));
        assert_eq!(
            runner.units.lock().unwrap().as_slice(),
            &["linear_regression.py".to_string()]
        );
    }

    #[tokio::test]
    async fn collection_failure_fails_the_tick() {
        let runner = Arc::new(FixedRunner::default());
        let factory = PredictorFactory::new(runner.clone(), "algorithms");
        let predictor = factory.new_predictor(&gru_model()).unwrap();
        let mut forecast = ForecastLoop::new("default/api", worker(true), predictor, 1);

        let err = forecast.tick().await.unwrap_err();
        assert!(format!("{err:#}").contains("backend down"));
        assert!(runner.units.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let factory = PredictorFactory::new(Arc::new(FixedRunner::default()), "algorithms");
        let predictor = factory.new_predictor(&gru_model()).unwrap();
        let mut forecast = ForecastLoop::new("default/api", worker(false), predictor, 1);

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(async move {
            forecast.run(Duration::from_secs(3600), rx).await;
        });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
