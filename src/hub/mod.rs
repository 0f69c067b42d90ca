//! Hub layer: connection identity, room membership, lifecycle and the
//! generic dispatch loop shared by both transports.
//!
//! A [`Hub`] is parameterised by its [`Client`] type. The WebSocket and SSE
//! modules each provide one client type and a type alias for their hub.

pub mod client;
pub mod conn_id;
pub mod connection_event;
pub mod dispatch;
pub mod event_bus;
pub mod lifecycle;
pub mod rooms;

pub use client::Client;
pub use conn_id::ConnId;
pub use connection_event::{ConnectionEvent, Transport};
pub use dispatch::Hub;
pub use event_bus::EventBus;
pub use lifecycle::{HubState, Lifecycle};
pub use rooms::RoomIndex;
