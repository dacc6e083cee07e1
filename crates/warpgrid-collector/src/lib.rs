//! warpgrid-collector — metric collection for predictive autoscaling.
//!
//! Turns backend-specific time-series queries into a uniform stream of
//! `TimestampedMetric` samples.
//!
//! # Architecture
//!
//! ```text
//! MetricCollector (catalog: MetricType → query)
//!   ├── set_server_address() → validates + pings the backend
//!   └── create_worker(type) → Worker
//!         ├── collect() → QueryBackend::instant_query() → buffer
//!         └── drain()   → samples, buffer cleared
//!
//! QueryBackend
//!   └── HttpQueryBackend → Prometheus /api/v1/query over hyper
//! ```

pub mod backend;
pub mod collector;
pub mod error;
pub mod prometheus;

pub use backend::{DEFAULT_QUERY_TIMEOUT, HttpQueryBackend, QueryBackend, parse_query_response};
pub use collector::{MetricCollector, Worker};
pub use error::{CollectorError, CollectorResult};
pub use prometheus::{AVG_NODE_CPU_USAGE, PrometheusCollector, PrometheusWorker, avg_node_cpu_usage};
