//! Route configuration for the webhook server.

use std::sync::Arc;

use axum::routing::{get, post, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{get_image, healthz, webhook};
use crate::state::AppState;

/// Create the server router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/webhook", post(webhook))
        .route("/images/{name}", get(get_image))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn make_test_router(dir: &std::path::Path) -> Router {
        let config = ServerConfig::default()
            .with_image_dir(dir)
            .with_prometheus_url("http://127.0.0.1:1");
        create_router(Arc::new(AppState::from_config(config).unwrap()))
    }

    #[tokio::test]
    async fn test_healthz_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_test_router(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Ok!");
    }

    #[tokio::test]
    async fn test_webhook_route_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_test_router(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from("[]"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_route_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_test_router(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from(r#"{"version": "4", "alerts": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn test_webhook_requires_post() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_test_router(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/webhook").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_image_route_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_test_router(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/images/..%2Fsecret.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = make_test_router(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
