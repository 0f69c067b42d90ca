//! # realtime-hub
//!
//! Realtime fan-out to many concurrently connected clients over WebSocket
//! and Server-Sent Events, with broadcast-to-all, rooms, and graceful,
//! deadline-bound shutdown.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, SSE)
//!     │
//!     ├── WsService (ws/)          ├── SseService (sse/)
//!     │     read loop / write loop │     frame queue → response body
//!     │                            │
//!     └────────── Hub<C> (hub/) ───┘
//!                   │
//!                   ├── dispatch loop: register / unregister / broadcast
//!                   ├── identifier index + RoomIndex (room fan-out)
//!                   ├── Lifecycle: Idle → Running → Draining → Stopped
//!                   └── EventBus: connect / disconnect / stream events
//! ```
//!
//! A slow client never stalls the others: every send is a non-blocking
//! enqueue into a bounded per-connection queue, and a client whose queue is
//! full is dropped and disconnected.

pub mod api;
pub mod app_state;
pub mod config;
pub mod demo;
pub mod error;
pub mod hub;
pub mod sse;
pub mod ws;
