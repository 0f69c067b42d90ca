//! Realtime endpoints: connection info and manual event triggers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{EndpointInfo, RoomInfo, TriggerParams, TriggerResponse};
use crate::api::{SSE_EVENTS_PATH, WS_CHAT_PATH};
use crate::app_state::AppState;
use crate::error::RealtimeError;
use crate::hub::{Client, Hub};

/// `GET /ws/info`: WebSocket connection info.
pub async fn ws_info(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(endpoint_info(&state.ws_hub, WS_CHAT_PATH).await))
}

/// `GET /sse/info`: Event-stream connection info.
pub async fn sse_info(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(endpoint_info(&state.sse_hub, SSE_EVENTS_PATH).await))
}

/// `POST /sse/trigger?event=<name>`: Broadcast the JSON body to every
/// stream client as a named event.
///
/// # Errors
///
/// Returns [`RealtimeError::InvalidRequest`] if the body is not JSON, or
/// [`RealtimeError::HubNotRunning`] once the stream hub is shutting down.
pub async fn trigger_event(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, RealtimeError> {
    let Json(data) = body.map_err(|e| RealtimeError::InvalidRequest(e.body_text()))?;
    if params.event.trim().is_empty() {
        return Err(RealtimeError::InvalidRequest(
            "event name must not be empty".to_string(),
        ));
    }

    let receivers = state.sse_hub.connection_count().await;
    state
        .sse_hub
        .broadcast_named(&params.event, data.clone())
        .await?;
    tracing::info!(event = %params.event, receivers, "sse event triggered");

    Ok((
        StatusCode::OK,
        Json(TriggerResponse {
            message: "Event sent",
            event: params.event,
            data,
            receivers,
        }),
    ))
}

async fn endpoint_info<C: Client>(hub: &Hub<C>, endpoint: &'static str) -> EndpointInfo {
    let mut rooms = Vec::new();
    for name in hub.rooms().await {
        let members = hub.room_count(&name).await;
        rooms.push(RoomInfo { name, members });
    }
    EndpointInfo {
        connected_clients: hub.connection_count().await,
        endpoint,
        hub_state: hub.state(),
        rooms,
    }
}

/// Realtime info and trigger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws/info", get(ws_info))
        .route("/sse/info", get(sse_info))
        .route("/sse/trigger", post(trigger_event))
}
