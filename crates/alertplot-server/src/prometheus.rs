//! Range queries against the Prometheus HTTP API.

use std::future::Future;
use std::time::Duration;

use alertplot_core::{Labels, QueryWindow, Sample, TimeSeries};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::QueryError;

/// Longest response body quoted in an error.
const MAX_ERROR_BODY: usize = 512;

/// A source of range-query results.
pub trait MetricSource: Send + Sync {
    /// Evaluates `query` over `window` at `step` resolution.
    fn query_range(
        &self,
        query: &str,
        window: QueryWindow,
        step: Duration,
    ) -> impl Future<Output = Result<Vec<TimeSeries>, QueryError>> + Send;
}

/// Client for `/api/v1/query_range`.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl PrometheusClient {
    /// Creates a client for the Prometheus server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::InvalidUrl` if `base_url` is not an HTTP(S) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let invalid = |reason: String| QueryError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        let mut endpoint = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", endpoint.scheme())));
        }
        endpoint
            .path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "query_range"]);

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        })
    }

    /// Full URL of the range query endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn fetch(
        &self,
        query: &str,
        window: QueryWindow,
        step: Duration,
    ) -> Result<Vec<TimeSeries>, QueryError> {
        let params = [
            ("query", query.to_string()),
            ("start", unix_seconds(window.start())),
            ("end", unix_seconds(window.end)),
            ("step", step.as_secs_f64().to_string()),
        ];

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&params)
            .send()
            .await
            .map_err(|e| QueryError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| QueryError::Request(e.to_string()))?;

        let parsed: ApiResponse = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(QueryError::Status {
                    status: status.as_u16(),
                    body: truncate(&String::from_utf8_lossy(&body)),
                });
            }
            Err(e) => return Err(QueryError::Decode(e.to_string())),
        };

        if parsed.status != "success" {
            return Err(QueryError::Backend {
                error_type: parsed.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: parsed.error.unwrap_or_default(),
            });
        }

        let data = parsed
            .data
            .ok_or_else(|| QueryError::Decode("success response without data".to_string()))?;
        if data.result_type != "matrix" {
            return Err(QueryError::Decode(format!(
                "expected matrix result, got {}",
                data.result_type
            )));
        }

        let series = data
            .result
            .into_iter()
            .map(MatrixSeries::into_time_series)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(query, series = series.len(), "range query complete");
        Ok(series)
    }
}

impl MetricSource for PrometheusClient {
    async fn query_range(
        &self,
        query: &str,
        window: QueryWindow,
        step: Duration,
    ) -> Result<Vec<TimeSeries>, QueryError> {
        tokio::time::timeout(self.timeout, self.fetch(query, window, step))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))?
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    #[serde(default)]
    result: Vec<MatrixSeries>,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    metric: Labels,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl MatrixSeries {
    fn into_time_series(self) -> Result<TimeSeries, QueryError> {
        let samples = self
            .values
            .into_iter()
            .map(|(ts, value)| {
                DateTime::<Utc>::from_timestamp_millis((ts * 1000.0).round() as i64)
                    .map(|timestamp| Sample::new(timestamp, value))
                    .ok_or_else(|| QueryError::Decode(format!("timestamp out of range: {ts}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TimeSeries::with_samples(self.metric, samples))
    }
}

fn unix_seconds(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::{TimeDelta, TimeZone};
    use serde_json::{json, Value};
    use test_case::test_case;

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn fake_prometheus(status: StatusCode, body: Value, delay: Duration) -> (SocketAddr, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/prom/api/v1/query_range",
                get(
                    move |State(seen): State<Seen>, Query(params): Query<HashMap<String, String>>| {
                        let body = body.clone();
                        async move {
                            seen.lock().unwrap().push(params);
                            tokio::time::sleep(delay).await;
                            (status, Json(body))
                        }
                    },
                ),
            )
            .with_state(Arc::clone(&seen));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    fn window() -> QueryWindow {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 20, 0).unwrap();
        QueryWindow::ending_at(end, TimeDelta::minutes(20))
    }

    fn client(addr: SocketAddr, timeout: Duration) -> PrometheusClient {
        PrometheusClient::new(&format!("http://{addr}/prom/"), timeout).unwrap()
    }

    #[test_case("http://prom:9090", "http://prom:9090/api/v1/query_range" ; "bare host")]
    #[test_case("http://prom:9090/", "http://prom:9090/api/v1/query_range" ; "trailing slash")]
    #[test_case("https://o.example.com/prometheus", "https://o.example.com/prometheus/api/v1/query_range" ; "path prefix")]
    fn endpoint_is_joined(base: &str, expected: &str) {
        let client = PrometheusClient::new(base, Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint().as_str(), expected);
    }

    #[test_case("not a url" ; "unparseable")]
    #[test_case("ftp://prom" ; "wrong scheme")]
    fn rejects_bad_base_url(base: &str) {
        assert!(matches!(
            PrometheusClient::new(base, Duration::from_secs(1)),
            Err(QueryError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn decodes_matrix_and_sends_window() {
        let body = json!({
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {
                        "metric": {"__name__": "up", "job": "api"},
                        "values": [[1714564800, "1"], [1714564815.5, "0"]]
                    },
                    {"metric": {"job": "db"}, "values": []}
                ]
            }
        });
        let (addr, seen) = fake_prometheus(StatusCode::OK, body, Duration::ZERO).await;

        let series = client(addr, Duration::from_secs(5))
            .query_range("up < 1", window(), Duration::from_secs(15))
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].metric_name(), Some("up"));
        assert_eq!(series[0].samples.len(), 2);
        assert_eq!(series[0].samples[1].value, "0");
        assert_eq!(series[0].samples[1].timestamp.timestamp_millis(), 1_714_564_815_500);
        assert!(series[1].samples.is_empty());

        let params = seen.lock().unwrap()[0].clone();
        assert_eq!(params["query"], "up < 1");
        assert_eq!(params["start"], "1714564800.000");
        assert_eq!(params["end"], "1714566000.000");
        assert_eq!(params["step"], "15");
    }

    #[tokio::test]
    async fn backend_error_is_reported() {
        let body = json!({"status": "error", "errorType": "bad_data", "error": "parse error at char 3"});
        let (addr, _) = fake_prometheus(StatusCode::BAD_REQUEST, body, Duration::ZERO).await;

        let err = client(addr, Duration::from_secs(5))
            .query_range("up <", window(), Duration::from_secs(15))
            .await
            .unwrap_err();

        match err {
            QueryError::Backend { error_type, message } => {
                assert_eq!(error_type, "bad_data");
                assert_eq!(message, "parse error at char 3");
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_matrix_result_is_rejected() {
        let body = json!({"status": "success", "data": {"resultType": "vector", "result": []}});
        let (addr, _) = fake_prometheus(StatusCode::OK, body, Duration::ZERO).await;

        let err = client(addr, Duration::from_secs(5))
            .query_range("up", window(), Duration::from_secs(15))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let body = json!({"status": "success", "data": {"resultType": "matrix", "result": []}});
        let (addr, _) = fake_prometheus(StatusCode::OK, body, Duration::from_secs(5)).await;

        let err = client(addr, Duration::from_millis(100))
            .query_range("up", window(), Duration::from_secs(15))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Timeout(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(addr, Duration::from_secs(5))
            .query_range("up", window(), Duration::from_secs(15))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Request(_)));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        let truncated = truncate(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
    }
}
