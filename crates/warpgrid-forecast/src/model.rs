//! Per-target model configuration.
//!
//! A `ModelConfig` names the algorithm family (`type`) and carries one
//! optional section per family. The section matching `type` must be
//! present for the predictor to do anything; a missing section is reported
//! by the predictor at call time, not at parse time.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Family tag for the recurrent-network (GRU) model.
pub const TYPE_GRU: &str = "GRU";

/// Family tag for the linear-regression model.
pub const TYPE_LINEAR: &str = "Linear";

/// Calculation timeout used when a model does not override it.
pub const DEFAULT_CALCULATION_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Algorithm family tag, e.g. `"GRU"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Upper bound on a single train/predict invocation.
    #[serde(default, deserialize_with = "crate::duration::deserialize_opt")]
    pub calculation_timeout: Option<Duration>,
    pub gru: Option<GruConfig>,
    pub linear: Option<LinearConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GruConfig {
    /// Samples required before training.
    pub train_size: usize,
    /// Samples fed to a prediction; also the history bound after a prune.
    pub predict_size: usize,
    /// How far ahead the forecast targets.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub look_ahead: Duration,
    /// Minimum time between retrainings.
    #[serde(default, deserialize_with = "crate::duration::deserialize_opt")]
    pub update_interval: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LinearConfig {
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub look_ahead: Duration,
    /// Number of past replica decisions kept for the regression.
    pub history_size: usize,
}

impl ModelConfig {
    /// Build a GRU model configuration.
    pub fn gru(gru: GruConfig) -> Self {
        Self {
            kind: TYPE_GRU.to_string(),
            calculation_timeout: None,
            gru: Some(gru),
            linear: None,
        }
    }

    /// Build a linear-regression model configuration.
    pub fn linear(linear: LinearConfig) -> Self {
        Self {
            kind: TYPE_LINEAR.to_string(),
            calculation_timeout: None,
            gru: None,
            linear: Some(linear),
        }
    }

    pub fn with_calculation_timeout(mut self, timeout: Duration) -> Self {
        self.calculation_timeout = Some(timeout);
        self
    }

    /// The configured calculation timeout, or the 30s default.
    pub fn timeout(&self) -> Duration {
        self.calculation_timeout.unwrap_or(DEFAULT_CALCULATION_TIMEOUT)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(gru) = &self.gru {
            if gru.predict_size == 0 {
                return Err(ConfigError::Invalid("gru.predict_size must be > 0".into()));
            }
            if gru.predict_size > gru.train_size {
                return Err(ConfigError::Invalid(format!(
                    "gru.predict_size ({}) must not exceed gru.train_size ({})",
                    gru.predict_size, gru.train_size
                )));
            }
        }
        if let Some(linear) = &self.linear
            && linear.history_size == 0
        {
            return Err(ConfigError::Invalid(
                "linear.history_size must be > 0".into(),
            ));
        }
        if self.calculation_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(
                "calculation_timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}
