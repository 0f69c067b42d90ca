//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;
use axum::routing::get;

use super::service::{FrameHandler, WsService};

/// `GET <path>`: Upgrade HTTP connection to WebSocket.
pub async fn ws_handler<H: FrameHandler>(
    ws: WebSocketUpgrade,
    State(service): State<Arc<WsService<H>>>,
) -> Response {
    service.upgrade(ws)
}

/// Builds a router serving `service` at `path`, mergeable into any app router.
pub fn router<H, S>(path: &str, service: Arc<WsService<H>>) -> Router<S>
where
    H: FrameHandler,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(path, get(ws_handler::<H>))
        .with_state(service)
}
