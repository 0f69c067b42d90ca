//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;
use crate::hub::HubState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    ws_hub: HubState,
    sse_hub: HubState,
}

/// `GET /health`: Service health status.
///
/// Reports `draining` with `503 Service Unavailable` once either hub has
/// stopped accepting clients, so load balancers stop routing here first.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ws_hub = state.ws_hub.state();
    let sse_hub = state.sse_hub.state();
    let healthy = state.ws_hub.is_running() && state.sse_hub.is_running();
    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    };
    (
        code,
        Json(HealthResponse {
            status,
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            ws_hub,
            sse_hub,
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
