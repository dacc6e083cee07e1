//! warpgrid-forecast — shared types for predictive autoscaling.
//!
//! Everything the metric collector and the predictors exchange lives here:
//! timestamped metric samples, metric type identities, per-target model
//! configuration, and the `forecast.toml` file format consumed by
//! `forecastd`.

pub mod config;
pub mod duration;
pub mod error;
pub mod model;
pub mod types;

pub use config::{CollectorSection, CustomMetric, ForecastConfig, RunnerSection, TargetConfig};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use model::{
    DEFAULT_CALCULATION_TIMEOUT, GruConfig, LinearConfig, ModelConfig, TYPE_GRU, TYPE_LINEAR,
};
pub use types::{MetricType, TimestampedMetric, TimestampedReplicas};
