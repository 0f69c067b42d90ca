//! The contract a transport connection exposes to the hub.

use std::fmt::Debug;

use super::{ConnId, Transport};
use crate::error::RealtimeError;

/// A live client attachment the hub can register, deliver to, and close.
///
/// Implemented by [`crate::ws::WsConnection`] and [`crate::sse::SseStream`].
/// Every method must return without waiting on the remote peer: the hub
/// calls them from its dispatch loop and from room broadcasts, where a slow
/// consumer must never stall delivery to the others.
pub trait Client: Debug + Send + Sync + 'static {
    /// The unit of fan-out delivery, cloned once per recipient.
    type Payload: Clone + Debug + Send + Sync + 'static;

    /// Transport kind, reported in lifecycle events.
    const TRANSPORT: Transport;

    /// Returns the process-unique identifier of this connection.
    fn id(&self) -> ConnId;

    /// Enqueues `payload` for delivery without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ConnectionClosed`] if the connection is
    /// closed, or [`RealtimeError::Backpressure`] if its outbound queue is
    /// full.
    fn deliver(&self, payload: &Self::Payload) -> Result<(), RealtimeError>;

    /// Enqueues the transport's "going away" notification, best effort.
    fn farewell(&self);

    /// Closes the connection. Idempotent; returns `true` only for the call
    /// that actually closed it.
    fn close(&self) -> bool;

    /// Returns `true` once the connection has been closed.
    fn is_closed(&self) -> bool;
}
