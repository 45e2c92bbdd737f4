//! Error types for the alertplot server.

use std::net::SocketAddr;
use std::time::Duration;

use alertplot_expr::ExprError;
use alertplot_render::RenderError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors from the metrics backend.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The backend URL is unusable.
    #[error("invalid backend URL {url}: {reason}")]
    InvalidUrl {
        /// The configured URL.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The HTTP request could not be completed.
    #[error("request failed: {0}")]
    Request(String),

    /// The query did not finish in time.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a non-success status and no error body.
    #[error("backend returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The backend reported a query error.
    #[error("backend error ({error_type}): {message}")]
    Backend {
        /// Error category reported by the backend.
        error_type: String,
        /// Error message reported by the backend.
        message: String,
    },

    /// The response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Errors from an image store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing an image failed.
    #[error("image store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image name is not one the store could have produced.
    #[error("invalid image name: {0}")]
    InvalidName(String),

    /// No image with that name exists.
    #[error("image not found: {0}")]
    NotFound(String),
}

/// Errors from a notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notification request could not be completed.
    #[error("notification request failed: {0}")]
    Request(String),

    /// The chat service rejected the message.
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Errors that abort charting an alert condition.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The webhook payload is missing required data.
    #[error("invalid alert payload: {0}")]
    Payload(String),

    /// The alerting expression could not be parsed.
    #[error(transparent)]
    Expr(#[from] ExprError),

    /// The expression holds no threshold comparison to chart.
    #[error("expression has no threshold comparison: {0}")]
    NoConditions(String),

    /// The metric query failed.
    #[error("metric query failed: {0}")]
    Query(#[from] QueryError),

    /// The chart could not be rendered.
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// The chart could not be stored.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The notification could not be sent.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// A blocking render task panicked or was cancelled.
    #[error("render task failed: {0}")]
    Task(String),
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors returned by the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Resource not found.
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Some alerts of a webhook call could not be charted.
    #[error("{failed} of {total} alerts failed: {reasons}")]
    AlertsFailed {
        /// Number of failed alerts.
        failed: usize,
        /// Number of alerts in the payload.
        total: usize,
        /// Failure messages joined by `; `.
        reasons: String,
    },

    /// Startup or wiring failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(name) => Self::InvalidRequest(format!("invalid image name: {name}")),
            StoreError::NotFound(name) => Self::NotFound("image".to_string(), name),
            StoreError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Self::NotFound(_, _) => (StatusCode::NOT_FOUND, "not_found"),
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::AlertsFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "alerts_failed"),
            Self::BindFailed(_, _) | Self::Config(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn alerts_failed_is_500_with_reasons() {
        let err = ServerError::AlertsFailed {
            failed: 1,
            total: 2,
            reasons: "metric query failed: query timed out after 10s".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "alerts_failed");
        assert!(json["message"].as_str().unwrap().contains("1 of 2 alerts failed"));
    }

    #[tokio::test]
    async fn invalid_request_is_400() {
        let response = ServerError::InvalidRequest("bad json".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_request");
    }

    #[tokio::test]
    async fn store_errors_map_to_status() {
        let not_found: ServerError = StoreError::NotFound("a.png".to_string()).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ServerError = StoreError::InvalidName("../x".to_string()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn pipeline_error_display() {
        let err = PipelineError::from(QueryError::Timeout(Duration::from_secs(10)));
        assert_eq!(err.to_string(), "metric query failed: query timed out after 10s");

        let err = PipelineError::Payload("generatorURL has no g0.expr".to_string());
        assert_eq!(err.to_string(), "invalid alert payload: generatorURL has no g0.expr");

        let err = PipelineError::from(RenderError::Conversion {
            series: "up".to_string(),
            value: "x".to_string(),
        });
        assert_eq!(err.to_string(), "render failed: sample value not float in up: x");
    }

    #[test]
    fn query_error_display() {
        let err = QueryError::Backend {
            error_type: "bad_data".to_string(),
            message: "parse error".to_string(),
        };
        assert_eq!(err.to_string(), "backend error (bad_data): parse error");
    }
}
