//! Query backends.
//!
//! `HttpQueryBackend` talks to the Prometheus HTTP API
//! (`/api/v1/query`) over a plain HTTP/1.1 connection per request.
//! Every request is bounded by the backend's timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::{BodyExt, Empty};
use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::debug;
use url::Url;

use warpgrid_forecast::TimestampedMetric;

use crate::error::{CollectorError, CollectorResult};

/// Default bound on a single backend request.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can evaluate an instant query.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Evaluate `query` at time `at` and return one sample per series.
    async fn instant_query(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> CollectorResult<Vec<TimestampedMetric>>;
}

/// Prometheus HTTP API client.
#[derive(Debug, Clone)]
pub struct HttpQueryBackend {
    base: Url,
    timeout: Duration,
}

impl HttpQueryBackend {
    /// Validate `address` and build a client for it. Does not connect.
    pub fn new(address: &str, timeout: Duration) -> CollectorResult<Self> {
        let base = Url::parse(address.trim())
            .map_err(|e| CollectorError::Connection(format!("invalid address {address:?}: {e}")))?;
        if base.scheme() != "http" {
            return Err(CollectorError::Connection(format!(
                "unsupported scheme {:?} in {address:?}, expected http",
                base.scheme()
            )));
        }
        if base.host_str().is_none_or(str::is_empty) {
            return Err(CollectorError::Connection(format!(
                "missing host in {address:?}"
            )));
        }
        Ok(Self { base, timeout })
    }

    pub fn address(&self) -> &str {
        self.base.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check the backend answers at all.
    pub async fn ping(&self) -> CollectorResult<()> {
        let url = self.endpoint("api/v1/status/buildinfo")?;
        let (status, _) = self.get(&url).await.map_err(CollectorError::Connection)?;
        if !status.is_success() {
            return Err(CollectorError::Connection(format!(
                "{} answered {status}",
                self.base
            )));
        }
        debug!(address = %self.base, "metrics backend reachable");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> CollectorResult<Url> {
        // Keep any path prefix the base carries (e.g. behind a reverse proxy).
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }
        base.join(path)
            .map_err(|e| CollectorError::Connection(format!("invalid endpoint {path}: {e}")))
    }

    async fn get(&self, url: &Url) -> Result<(http::StatusCode, Bytes), String> {
        let host = url.host_str().ok_or("missing host")?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = format!("{host}:{port}");
        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };

        let request = async {
            let stream = tokio::net::TcpStream::connect(authority.as_str())
                .await
                .map_err(|e| format!("connect to {authority} failed: {e}"))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| format!("handshake with {authority} failed: {e}"))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let req = http::Request::builder()
                .method("GET")
                .uri(path.as_str())
                .header("host", authority.as_str())
                .header("accept", "application/json")
                .header("user-agent", "warpgrid-collector/0.1")
                .body(Empty::<Bytes>::new())
                .map_err(|e| format!("invalid request: {e}"))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| format!("request to {authority} failed: {e}"))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| format!("reading response from {authority} failed: {e}"))?
                .to_bytes();
            Ok::<_, String>((status, body))
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "request to {authority} timed out after {:?}",
                self.timeout
            )),
        }
    }
}

#[async_trait]
impl QueryBackend for HttpQueryBackend {
    async fn instant_query(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> CollectorResult<Vec<TimestampedMetric>> {
        let mut url = self.endpoint("api/v1/query")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("time", &format_unix(at));

        let (status, body) = self.get(&url).await.map_err(CollectorError::Collection)?;
        // Prometheus reports bad queries as 400/422 with a JSON error body,
        // so decode before looking at the status.
        let response = match serde_json::from_slice::<QueryResponse>(&body) {
            Ok(response) => response,
            Err(_) if !status.is_success() => {
                return Err(CollectorError::Collection(format!(
                    "query endpoint answered {status}"
                )));
            }
            Err(e) => return Err(malformed(e)),
        };
        into_samples(response)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    data: Option<QueryData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum QueryData {
    Vector(Vec<VectorSample>),
    Scalar(IgnoredAny),
    Matrix(IgnoredAny),
    String(IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    /// `[<unix seconds>, "<value>"]`
    value: (f64, String),
}

/// Decode an instant-query response body into samples.
///
/// The whole body is decoded before anything is returned, so a bad sample
/// anywhere fails the whole query.
pub fn parse_query_response(body: &[u8]) -> CollectorResult<Vec<TimestampedMetric>> {
    let response: QueryResponse = serde_json::from_slice(body).map_err(malformed)?;
    into_samples(response)
}

fn into_samples(response: QueryResponse) -> CollectorResult<Vec<TimestampedMetric>> {
    if response.status != "success" {
        return Err(CollectorError::Collection(format!(
            "query failed ({}): {}",
            response.error_type.as_deref().unwrap_or("unknown"),
            response.error.as_deref().unwrap_or("no error message"),
        )));
    }

    let samples = match response.data {
        Some(QueryData::Vector(samples)) => samples,
        Some(QueryData::Scalar(_)) => return Err(unexpected_result("scalar")),
        Some(QueryData::Matrix(_)) => return Err(unexpected_result("matrix")),
        Some(QueryData::String(_)) => return Err(unexpected_result("string")),
        None => return Err(CollectorError::Collection("query response has no data".into())),
    };

    samples
        .into_iter()
        .map(|sample| {
            let (secs, raw) = sample.value;
            let value = raw.parse::<f64>().map_err(|e| {
                CollectorError::Collection(format!("invalid sample value {raw:?}: {e}"))
            })?;
            let timestamp = Utc
                .timestamp_millis_opt((secs * 1000.0).round() as i64)
                .single()
                .ok_or_else(|| {
                    CollectorError::Collection(format!("invalid sample timestamp {secs}"))
                })?;
            Ok(TimestampedMetric::new(value, timestamp))
        })
        .collect()
}

fn malformed(e: serde_json::Error) -> CollectorError {
    CollectorError::Collection(format!("malformed query response: {e}"))
}

fn unexpected_result(kind: &str) -> CollectorError {
    CollectorError::Collection(format!("expected a vector result, got {kind}"))
}

/// Unix seconds with millisecond precision, as the query API expects.
fn format_unix(at: DateTime<Utc>) -> String {
    let millis = at.timestamp_millis();
    format!("{}.{:03}", millis.div_euclid(1000), millis.rem_euclid(1000))
}
