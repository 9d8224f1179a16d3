//! Health check endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;

/// Liveness plus how long the server has been up and how much it has counted
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "ghostline",
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "requests_total": state.metrics.total(),
        })),
    )
}
