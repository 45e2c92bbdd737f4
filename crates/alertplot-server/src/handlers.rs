//! HTTP request handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::payload::HookMessage;
use crate::state::AppState;

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "Ok!"
}

/// Alertmanager webhook receiver.
///
/// Charts every alert of the call. Answers `{"success": true}` when every
/// chart was delivered. Otherwise answers 500 so Alertmanager retries; the
/// retry resends the whole group, so charts that already went out are
/// posted again. With `retry_failed` off, failures are reported in a 200
/// body instead and nothing is resent.
pub async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> ServerResult<Json<Value>> {
    if state.config().debug {
        debug!(body = %String::from_utf8_lossy(&body), "webhook request");
    }

    let message: HookMessage = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "cannot decode webhook body");
        ServerError::InvalidRequest(format!("invalid request body: {e}"))
    })?;

    info!(
        group_labels = ?message.group_labels,
        common_labels = ?message.common_labels,
        alerts = message.alerts.len(),
        "webhook received"
    );

    let total = message.alerts.len();
    let mut reasons = Vec::new();
    for hook_alert in &message.alerts {
        info!(
            status = %hook_alert.status,
            labels = ?hook_alert.labels,
            annotations = ?hook_alert.annotations,
            "alert"
        );

        let alert = match hook_alert.to_alert() {
            Ok(alert) => alert,
            Err(e) => {
                warn!(error = %e, "skipping alert");
                reasons.push(e.to_string());
                continue;
            }
        };

        let status = if hook_alert.status.is_empty() {
            &message.status
        } else {
            &hook_alert.status
        };
        let outcome = state.pipeline().handle_alert(status, &alert).await;
        if !outcome.is_success() {
            reasons.extend(outcome.failures.iter().map(ToString::to_string));
        }
    }

    if reasons.is_empty() {
        Ok(Json(json!({"success": true})))
    } else if !state.config().retry_failed {
        warn!(failed = reasons.len(), total, "charts failed, not asking for a retry");
        Ok(Json(json!({
            "success": false,
            "failed": reasons.len(),
            "total": total,
            "message": reasons.join("; "),
        })))
    } else {
        Err(ServerError::AlertsFailed {
            failed: reasons.len(),
            total,
            reasons: reasons.join("; "),
        })
    }
}

/// Serves a stored chart.
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let bytes = state.images().read(&name).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
