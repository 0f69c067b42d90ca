//! Lifecycle events emitted for logging and metrics collaborators.
//!
//! Transports publish a [`ConnectionEvent`] through the
//! [`super::EventBus`] whenever a client attaches or detaches, and hubs
//! publish one when their dispatch loop stops.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ConnId;

/// Which transport a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Full-duplex WebSocket.
    WebSocket,
    /// Server-to-client event stream.
    Sse,
}

/// Connection lifecycle event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// A WebSocket upgrade completed.
    WsConnected {
        /// Connection identifier.
        conn_id: ConnId,
        /// Connection timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A WebSocket read loop terminated.
    WsDisconnected {
        /// Connection identifier.
        conn_id: ConnId,
        /// Disconnection timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event stream was opened.
    SseOpened {
        /// Connection identifier.
        conn_id: ConnId,
        /// Resume cursor sent by a reconnecting client, if any.
        last_event_id: Option<String>,
        /// Open timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event stream was closed.
    SseClosed {
        /// Connection identifier.
        conn_id: ConnId,
        /// Close timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A hub's dispatch loop exited after draining.
    HubStopped {
        /// Transport served by the hub.
        transport: Transport,
        /// Number of connections closed during the drain.
        closed_connections: usize,
        /// Stop timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl ConnectionEvent {
    /// Builds a [`ConnectionEvent::WsConnected`] stamped now.
    #[must_use]
    pub fn ws_connected(conn_id: ConnId) -> Self {
        Self::WsConnected {
            conn_id,
            timestamp: Utc::now(),
        }
    }

    /// Builds a [`ConnectionEvent::WsDisconnected`] stamped now.
    #[must_use]
    pub fn ws_disconnected(conn_id: ConnId) -> Self {
        Self::WsDisconnected {
            conn_id,
            timestamp: Utc::now(),
        }
    }

    /// Builds a [`ConnectionEvent::SseOpened`] stamped now.
    #[must_use]
    pub fn sse_opened(conn_id: ConnId, last_event_id: Option<String>) -> Self {
        Self::SseOpened {
            conn_id,
            last_event_id,
            timestamp: Utc::now(),
        }
    }

    /// Builds a [`ConnectionEvent::SseClosed`] stamped now.
    #[must_use]
    pub fn sse_closed(conn_id: ConnId) -> Self {
        Self::SseClosed {
            conn_id,
            timestamp: Utc::now(),
        }
    }

    /// Returns the connection this event concerns, if any.
    #[must_use]
    pub fn conn_id(&self) -> Option<ConnId> {
        match self {
            Self::WsConnected { conn_id, .. }
            | Self::WsDisconnected { conn_id, .. }
            | Self::SseOpened { conn_id, .. }
            | Self::SseClosed { conn_id, .. } => Some(*conn_id),
            Self::HubStopped { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::WsConnected { .. } => "ws_connected",
            Self::WsDisconnected { .. } => "ws_disconnected",
            Self::SseOpened { .. } => "sse_opened",
            Self::SseClosed { .. } => "sse_closed",
            Self::HubStopped { .. } => "hub_stopped",
        }
    }
}
