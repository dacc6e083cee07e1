//! Collector and worker contracts.
//!
//! A `MetricCollector` owns the catalog that binds each `MetricType` to a
//! backend query. Workers created from it run that one query on demand and
//! buffer the samples until the caller drains them.

use async_trait::async_trait;

use warpgrid_forecast::{MetricType, TimestampedMetric};

use crate::error::CollectorResult;

#[async_trait]
pub trait MetricCollector: Send + Sync {
    /// Point the collector at a backend. Fails if the address is malformed
    /// or nothing answers there.
    async fn set_server_address(&mut self, address: &str) -> CollectorResult<()>;

    /// Human-readable names of every registered metric type.
    fn list_metric_types(&self) -> Vec<String>;

    /// Register or overwrite the query bound to a metric type. The query is
    /// not checked until a worker first runs it.
    fn add_custom_metric(&mut self, metric_type: MetricType, query: String);

    /// Create a worker for a registered metric type.
    fn create_worker(&self, metric_type: &MetricType) -> CollectorResult<Box<dyn Worker>>;
}

/// Per-metric-type collector holding a drainable sample buffer.
///
/// Not meant to be shared: both `collect` and `drain` take `&mut self`.
#[async_trait]
pub trait Worker: Send {
    /// Run the bound query now and append every returned sample to the
    /// buffer. On error the buffer is left as it was.
    async fn collect(&mut self) -> CollectorResult<()>;

    /// Return all buffered samples and clear the buffer.
    fn drain(&mut self) -> Vec<TimestampedMetric>;

    /// Number of samples waiting to be drained.
    fn buffered(&self) -> usize;

    fn metric_type(&self) -> &MetricType;
}
