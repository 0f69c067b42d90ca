//! Demo application handlers served by the binary: a room-aware chat over
//! WebSocket and a live feed over Server-Sent Events.

pub mod chat;
pub mod feed;

pub use chat::ChatHandler;
pub use feed::{WelcomeHandler, spawn_clock};
