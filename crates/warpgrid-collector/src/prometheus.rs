//! Prometheus-backed metric collector.
//!
//! The catalog starts with an average node CPU utilization query; callers
//! register more with `add_custom_metric`. Workers share the collector's
//! backend but each keeps its own sample buffer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use warpgrid_forecast::{MetricType, TimestampedMetric};

use crate::backend::{DEFAULT_QUERY_TIMEOUT, HttpQueryBackend, QueryBackend};
use crate::collector::{MetricCollector, Worker};
use crate::error::{CollectorError, CollectorResult};

/// Name of the metric type seeded into every new catalog.
pub const AVG_NODE_CPU_USAGE: &str = "avg_node_cpu_usage";

const AVG_NODE_CPU_USAGE_QUERY: &str =
    r#"100 - (avg(irate(node_cpu_seconds_total{mode="idle"}[30m])) * 100)"#;

/// The seeded CPU utilization metric type.
pub fn avg_node_cpu_usage() -> MetricType {
    MetricType::new(AVG_NODE_CPU_USAGE, "%")
}

pub struct PrometheusCollector {
    /// Metric type → PromQL.
    queries: HashMap<MetricType, String>,
    backend: Option<Arc<dyn QueryBackend>>,
    server_address: Option<String>,
    query_timeout: Duration,
}

impl PrometheusCollector {
    /// Create a collector with the default catalog and no backend.
    pub fn new() -> Self {
        let mut queries = HashMap::new();
        queries.insert(avg_node_cpu_usage(), AVG_NODE_CPU_USAGE_QUERY.to_string());
        Self {
            queries,
            backend: None,
            server_address: None,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Bound applied to every backend request made after this call.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Use an already-built backend instead of connecting by address.
    pub fn with_backend(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn server_address(&self) -> Option<&str> {
        self.server_address.as_deref()
    }

    /// Registered metric types.
    pub fn metric_types(&self) -> impl Iterator<Item = &MetricType> {
        self.queries.keys()
    }

    /// Look up a metric type by name, ignoring the unit.
    pub fn find_metric_type(&self, name: &str) -> Option<&MetricType> {
        self.queries.keys().find(|t| t.name == name)
    }

    pub fn query_for(&self, metric_type: &MetricType) -> Option<&str> {
        self.queries.get(metric_type).map(String::as_str)
    }
}

impl Default for PrometheusCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricCollector for PrometheusCollector {
    async fn set_server_address(&mut self, address: &str) -> CollectorResult<()> {
        let backend = HttpQueryBackend::new(address, self.query_timeout)?;
        backend.ping().await?;

        info!(address, "metrics backend configured");
        self.server_address = Some(address.to_string());
        self.backend = Some(Arc::new(backend));
        Ok(())
    }

    fn list_metric_types(&self) -> Vec<String> {
        self.queries.keys().map(ToString::to_string).collect()
    }

    fn add_custom_metric(&mut self, metric_type: MetricType, query: String) {
        debug!(metric = %metric_type, %query, "registered metric query");
        self.queries.insert(metric_type, query);
    }

    fn create_worker(&self, metric_type: &MetricType) -> CollectorResult<Box<dyn Worker>> {
        let query = self
            .queries
            .get(metric_type)
            .ok_or_else(|| CollectorError::UnknownMetricType(metric_type.to_string()))?;
        let backend = self.backend.clone().ok_or(CollectorError::NotConnected)?;

        Ok(Box::new(PrometheusWorker {
            metric_type: metric_type.clone(),
            query: query.clone(),
            backend,
            buffer: Vec::new(),
        }))
    }
}

/// Collects one PromQL query into a local buffer.
pub struct PrometheusWorker {
    metric_type: MetricType,
    query: String,
    backend: Arc<dyn QueryBackend>,
    buffer: Vec<TimestampedMetric>,
}

impl PrometheusWorker {
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl Worker for PrometheusWorker {
    async fn collect(&mut self) -> CollectorResult<()> {
        let samples = self.backend.instant_query(&self.query, Utc::now()).await?;
        debug!(
            metric = %self.metric_type,
            samples = samples.len(),
            buffered = self.buffer.len() + samples.len(),
            "collected samples"
        );
        self.buffer.extend(samples);
        Ok(())
    }

    fn drain(&mut self) -> Vec<TimestampedMetric> {
        std::mem::take(&mut self.buffer)
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn metric_type(&self) -> &MetricType {
        &self.metric_type
    }
}
