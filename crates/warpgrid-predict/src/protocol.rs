//! JSON wire contract between predictors and algorithm units.
//!
//! ```text
//! train   → {"lookAhead": <ms>, "trainHistory":   [{"value", "timestamp"}, ...]}
//! predict → {"lookAhead": <ms>, "predictHistory": [{"value", "timestamp"}, ...]}
//! linear  → {"lookAhead": <ms>, "replicaHistory": [{"replicas", "time"}, ...]}
//! reply   ← {"value": <int>, "trained": <bool, optional>}
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use warpgrid_forecast::{TimestampedMetric, TimestampedReplicas};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest<'a> {
    #[serde(serialize_with = "as_millis")]
    pub look_ahead: Duration,
    pub train_history: &'a [TimestampedMetric],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest<'a> {
    #[serde(serialize_with = "as_millis")]
    pub look_ahead: Duration,
    pub predict_history: &'a [TimestampedMetric],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaPredictRequest<'a> {
    #[serde(serialize_with = "as_millis")]
    pub look_ahead: Duration,
    pub replica_history: &'a [TimestampedReplicas],
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AlgorithmResponse {
    pub value: i32,
    #[serde(default)]
    pub trained: Option<bool>,
}

fn as_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_millis() as u64)
}

/// Serialize a request built by this crate.
///
/// Requests only hold numbers, timestamps and slices of them, so failing
/// here is a bug, not a runtime condition.
pub(crate) fn encode<T: Serialize>(request: &T) -> Vec<u8> {
    serde_json::to_vec(request).expect("algorithm requests are always serializable")
}

/// Parse a unit's stdout.
pub fn decode(output: &[u8]) -> Result<AlgorithmResponse, serde_json::Error> {
    serde_json::from_slice(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn train_request_shape() {
        let history = [TimestampedMetric::new(
            1.5,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        )];
        let json: serde_json::Value = serde_json::from_slice(&encode(&TrainRequest {
            look_ahead: Duration::from_secs(60),
            train_history: &history,
        }))
        .unwrap();

        assert_eq!(json["lookAhead"], 60_000);
        assert_eq!(json["trainHistory"][0]["value"], 1.5);
        assert_eq!(json["trainHistory"][0]["timestamp"], "2024-05-01T00:00:00Z");
    }

    #[test]
    fn predict_request_uses_predict_history_key() {
        let json: serde_json::Value = serde_json::from_slice(&encode(&PredictRequest {
            look_ahead: Duration::from_millis(1500),
            predict_history: &[],
        }))
        .unwrap();

        assert_eq!(json["lookAhead"], 1500);
        assert!(json["predictHistory"].as_array().unwrap().is_empty());
        assert!(json.get("trainHistory").is_none());
    }

    #[test]
    fn decode_with_and_without_trained_flag() {
        assert_eq!(
            decode(br#"{"value": 5}"#).unwrap(),
            AlgorithmResponse { value: 5, trained: None }
        );
        assert_eq!(
            decode(br#"{"value": 0, "trained": true}"#).unwrap(),
            AlgorithmResponse { value: 0, trained: Some(true) }
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(b"Traceback (most recent call last):").is_err());
        assert!(decode(br#"{"trained": true}"#).is_err());
    }
}
