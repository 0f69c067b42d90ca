//! REST API layer: route handlers, DTOs, and router composition.

pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Path of the chat WebSocket endpoint.
pub const WS_CHAT_PATH: &str = "/ws/chat";
/// Path of the event-stream endpoint.
pub const SSE_EVENTS_PATH: &str = "/sse/events";

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new().merge(handlers::routes())
}
