//! Shared application state injected into all Axum handlers.

use crate::config::HubConfig;
use crate::hub::{EventBus, Hub};
use crate::sse::SseHub;
use crate::ws::WsHub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Hub of chat WebSocket connections.
    pub ws_hub: WsHub,
    /// Hub of event-stream clients.
    pub sse_hub: SseHub,
    /// Lifecycle event bus shared by both transports.
    pub events: EventBus,
}

impl AppState {
    /// Creates both hubs with `config`. Their dispatch loops are not
    /// started; see [`AppState::spawn_hubs`].
    #[must_use]
    pub fn new(config: &HubConfig, events: EventBus) -> Self {
        Self {
            ws_hub: Hub::new(config.clone(), events.clone()),
            sse_hub: Hub::new(config.clone(), events.clone()),
            events,
        }
    }

    /// Starts both dispatch loops on the runtime.
    pub fn spawn_hubs(&self) {
        drop(self.ws_hub.spawn());
        drop(self.sse_hub.spawn());
    }
}
