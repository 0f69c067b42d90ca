//! Broadcast channel for connection lifecycle events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Transports and
//! hubs publish [`ConnectionEvent`]s; logging or metrics collaborators
//! subscribe. Publishing never blocks and never fails the publisher.

use tokio::sync::broadcast;

use super::ConnectionEvent;

/// Broadcast bus for [`ConnectionEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ConnectionEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: ConnectionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_BUS_CAPACITY)
    }
}

/// Logs every event published on `bus` until the bus is dropped.
///
/// Intended to be spawned once at startup as the logging collaborator.
pub async fn log_events(bus: EventBus) {
    let mut rx = bus.subscribe();
    drop(bus);
    loop {
        match rx.recv().await {
            Ok(event) => match event.conn_id() {
                Some(conn_id) => {
                    tracing::debug!(conn_id = %conn_id, event = event.event_type_str(), "connection event");
                }
                None => tracing::info!(?event, "hub event"),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event logger lagged behind event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
