//! forecast.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ModelConfig;
use crate::types::MetricType;

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    pub collector: CollectorSection,
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSection {
    /// Base URL of the Prometheus-compatible query API.
    pub address: String,
    #[serde(default, deserialize_with = "crate::duration::deserialize_opt")]
    pub query_timeout: Option<Duration>,
    /// Extra metric types registered on top of the default catalog.
    #[serde(default)]
    pub metrics: Vec<CustomMetric>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomMetric {
    pub name: String,
    pub unit: String,
    pub query: String,
}

impl CustomMetric {
    pub fn metric_type(&self) -> MetricType {
        MetricType::new(&self.name, &self.unit)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Program used to launch algorithm units, e.g. `python3`.
    pub interpreter: Option<String>,
    #[serde(default = "default_algorithms_dir")]
    pub algorithms_dir: PathBuf,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            interpreter: None,
            algorithms_dir: default_algorithms_dir(),
        }
    }
}

fn default_algorithms_dir() -> PathBuf {
    PathBuf::from("algorithms")
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Scaling target name, e.g. `default/api`.
    pub name: String,
    /// Metric name from the collector catalog.
    pub metric: String,
    #[serde(default = "default_tick", deserialize_with = "crate::duration::deserialize")]
    pub interval: Duration,
    /// Replica count recorded until the first forecast exists.
    #[serde(default = "default_initial_replicas")]
    pub initial_replicas: i32,
    pub model: ModelConfig,
}

fn default_tick() -> Duration {
    Duration::from_secs(15)
}

fn default_initial_replicas() -> i32 {
    1
}

impl ForecastConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: ForecastConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.collector.address.trim().is_empty() {
            return Err(ConfigError::Invalid("collector.address is empty".into()));
        }
        for target in &self.targets {
            if target.interval.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "target {}: interval must be > 0",
                    target.name
                )));
            }
            target.model.validate().map_err(|e| match e {
                ConfigError::Invalid(msg) => {
                    ConfigError::Invalid(format!("target {}: {msg}", target.name))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Find a target by name.
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TYPE_LINEAR;

    const SAMPLE: &str = r#"
[collector]
address = "http://localhost:9090"
query_timeout = "10s"

[[collector.metrics]]
name = "http_rps"
unit = "req/s"
query = "sum(rate(http_requests_total[1m]))"

[runner]
interpreter = "python3"
algorithms_dir = "/opt/warpgrid/algorithms"

[[targets]]
name = "default/api"
metric = "avg_node_cpu_usage"
interval = "30s"

[targets.model]
type = "GRU"

[targets.model.gru]
train_size = 10
predict_size = 3
look_ahead = "1m"

[[targets]]
name = "default/worker"
metric = "http_rps"
initial_replicas = 2

[targets.model]
type = "Linear"

[targets.model.linear]
look_ahead = "30s"
history_size = 6
"#;

    #[test]
    fn parse_full_config() {
        let config = ForecastConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.collector.address, "http://localhost:9090");
        assert_eq!(config.collector.query_timeout, Some(Duration::from_secs(10)));
        assert_eq!(
            config.collector.metrics[0].metric_type(),
            MetricType::new("http_rps", "req/s")
        );
        assert_eq!(config.runner.interpreter.as_deref(), Some("python3"));
        assert_eq!(config.targets.len(), 2);

        let api = config.target("default/api").unwrap();
        assert_eq!(api.interval, Duration::from_secs(30));
        assert_eq!(api.initial_replicas, 1);

        let worker = config.target("default/worker").unwrap();
        assert_eq!(worker.interval, Duration::from_secs(15));
        assert_eq!(worker.initial_replicas, 2);
        assert_eq!(worker.model.kind, TYPE_LINEAR);
    }

    #[test]
    fn parse_minimal_config() {
        let config = ForecastConfig::from_toml(
            r#"
[collector]
address = "http://prometheus:9090"
"#,
        )
        .unwrap();
        assert!(config.targets.is_empty());
        assert_eq!(config.runner.algorithms_dir, PathBuf::from("algorithms"));
    }

    #[test]
    fn invalid_model_names_target() {
        let err = ForecastConfig::from_toml(
            r#"
[collector]
address = "http://prometheus:9090"

[[targets]]
name = "default/api"
metric = "avg_node_cpu_usage"

[targets.model]
type = "GRU"

[targets.model.gru]
train_size = 2
predict_size = 5
look_ahead = "1m"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("default/api"), "{err}");
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ForecastConfig::from_file(&path).unwrap();
        assert_eq!(config.targets.len(), 2);

        let missing = ForecastConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read(_))));
    }
}
