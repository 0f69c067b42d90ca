//! WebSocket transport: connections, read/write loops and the upgrade
//! endpoint.
//!
//! Each upgraded socket becomes a [`WsConnection`] served by a read loop
//! (inbound frames to a [`FrameHandler`]) and a write loop (outbound queue
//! to the socket, plus keep-alive pings). Connections may optionally be
//! attached to a [`WsHub`] for broadcast and room fan-out.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod service;

pub use connection::{Frame, WsConnection, WsHub};
pub use service::{FrameHandler, WsService};
