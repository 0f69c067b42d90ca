//! Axum event-stream handler.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;

use super::service::{SseService, StreamHandler};
use crate::error::RealtimeError;

/// `GET <path>`: Open a Server-Sent Events stream.
///
/// # Errors
///
/// Returns `503 Service Unavailable` if the attached hub is shutting down.
pub async fn sse_handler<H: StreamHandler>(
    State(service): State<Arc<SseService<H>>>,
    headers: HeaderMap,
) -> Result<Response, RealtimeError> {
    service.open(&headers).await
}

/// Builds a router serving `service` at `path`, mergeable into any app router.
pub fn router<H, S>(path: &str, service: Arc<SseService<H>>) -> Router<S>
where
    H: StreamHandler,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(path, get(sse_handler::<H>))
        .with_state(service)
}
