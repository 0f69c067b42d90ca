//! Server-Sent Events transport: wire encoding, streams and the endpoint.
//!
//! Each request becomes an [`SseStream`] whose frame queue is the response
//! body. Streams may optionally be attached to an [`SseHub`] for broadcast
//! and room fan-out.

pub mod event;
pub mod handler;
pub mod service;
pub mod stream;

pub use event::{SseData, SseEvent};
pub use service::{SseService, StreamHandler};
pub use stream::{SseBody, SseHub, SseStream};
