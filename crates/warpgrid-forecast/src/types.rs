//! Domain types shared between metric collection and prediction.
//!
//! All types serialize to the JSON shapes the external algorithm units
//! read: timestamps are RFC 3339 strings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single collected metric sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimestampedMetric {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl TimestampedMetric {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Identifies what is being measured, independent of how it is queried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MetricType {
    pub name: String,
    pub unit: String,
}

impl MetricType {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.unit)
    }
}

/// A past replica-count decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimestampedReplicas {
    pub replicas: i32,
    pub time: DateTime<Utc>,
}

impl TimestampedReplicas {
    pub fn new(replicas: i32, time: DateTime<Utc>) -> Self {
        Self { replicas, time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn metric_type_display() {
        let cpu = MetricType::new("avg_node_cpu_usage", "%");
        assert_eq!(cpu.to_string(), "avg_node_cpu_usage (%)");
    }

    #[test]
    fn metric_serializes_with_rfc3339_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_string(&TimestampedMetric::new(42.5, ts)).unwrap();
        assert_eq!(json, r#"{"value":42.5,"timestamp":"2024-05-01T12:00:00Z"}"#);
    }

    #[test]
    fn replicas_serialize_field_names() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(TimestampedReplicas::new(3, ts)).unwrap();
        assert_eq!(json["replicas"], 3);
        assert_eq!(json["time"], "2024-05-01T12:00:00Z");
    }
}
