use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::routes::AppState;

/// Reports `degraded` with 503 when the store cannot be reached.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, store) = match state.service.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let overall = if status.is_success() { "ok" } else { "degraded" };
    (
        status,
        Json(json!({
            "status": overall,
            "store": store,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "calc-scheduler",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
