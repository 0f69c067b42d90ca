//! Request and response shapes for the realtime info and trigger endpoints.

use serde::{Deserialize, Serialize};

use crate::hub::HubState;

/// Connection summary for one realtime endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    /// Number of clients currently registered with the endpoint's hub.
    pub connected_clients: usize,
    /// Path clients connect to.
    pub endpoint: &'static str,
    /// Lifecycle state of the endpoint's hub.
    pub hub_state: HubState,
    /// Rooms with at least one member.
    pub rooms: Vec<RoomInfo>,
}

/// Membership summary for one room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    /// Room name.
    pub name: String,
    /// Number of members.
    pub members: usize,
}

/// Query parameters for `POST /sse/trigger`.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerParams {
    /// Event name to broadcast. Defaults to `message`.
    #[serde(default = "default_event")]
    pub event: String,
}

fn default_event() -> String {
    "message".to_string()
}

/// Response for `POST /sse/trigger`.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    /// Confirmation text.
    pub message: &'static str,
    /// Event name that was broadcast.
    pub event: String,
    /// Event payload that was broadcast.
    pub data: serde_json::Value,
    /// Number of stream clients registered when the event was queued.
    pub receivers: usize,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn trigger_event_defaults_to_message() {
        let Ok(params) = serde_json::from_str::<TriggerParams>("{}") else {
            panic!("params should parse");
        };
        assert_eq!(params.event, "message");
    }
}
