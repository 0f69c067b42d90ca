//! Server-Sent Events stream wrapper.
//!
//! An [`SseStream`] encodes events into a bounded frame queue whose consumer
//! side, [`SseBody`], is the HTTP response body. Sends never wait on the
//! network: a full queue is reported as backpressure. Dropping the body
//! (the client went away, or the server stopped polling it) closes the
//! stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::event::{SseData, SseEvent, comment, retry_directive};
use crate::config::SseConfig;
use crate::error::RealtimeError;
use crate::hub::{Client, ConnId, ConnectionEvent, EventBus, Hub, Transport};

/// Hub of event-stream clients.
pub type SseHub = Hub<SseStream>;

/// One open event stream.
#[derive(Debug)]
pub struct SseStream {
    id: ConnId,
    outbound: Mutex<Option<mpsc::Sender<Bytes>>>,
    closed: watch::Sender<bool>,
    capacity: usize,
    last_event_id: Option<String>,
    events: EventBus,
}

impl SseStream {
    /// Opens a stream and returns it with the response body that drains it.
    ///
    /// Queues the `retry:` directive first when `config.retry_interval_ms`
    /// is non-zero, and publishes a stream-opened event.
    #[must_use]
    pub fn open(
        config: &SseConfig,
        last_event_id: Option<String>,
        events: EventBus,
    ) -> (Arc<Self>, SseBody) {
        let capacity = config.buffer_size.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);
        let stream = Arc::new(Self {
            id: ConnId::new(),
            outbound: Mutex::new(Some(tx)),
            closed,
            capacity,
            last_event_id,
            events,
        });

        if config.retry_interval_ms > 0 {
            let _ = stream.send_frame(retry_directive(config.retry_interval_ms));
        }
        stream.events.publish(ConnectionEvent::sse_opened(
            stream.id,
            stream.last_event_id.clone(),
        ));
        tracing::debug!(conn_id = %stream.id, last_event_id = ?stream.last_event_id, "sse stream opened");

        let body = SseBody {
            frames: rx,
            stream: Arc::clone(&stream),
        };
        (stream, body)
    }

    /// Returns the stream identifier.
    #[must_use]
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Returns the `Last-Event-ID` the client reconnected with, if any.
    ///
    /// The value is passed through unopened; interpreting it is up to the
    /// application.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Returns `true` if the client is resuming a previous stream.
    #[must_use]
    pub fn is_reconnect(&self) -> bool {
        self.last_event_id.is_some()
    }

    /// Queues an already-encoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ConnectionClosed`] once the stream is closed,
    /// or [`RealtimeError::Backpressure`] if the frame queue is full.
    pub fn send_frame(&self, frame: Bytes) -> Result<(), RealtimeError> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(RealtimeError::ConnectionClosed);
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RealtimeError::Backpressure {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => RealtimeError::ConnectionClosed,
        })
    }

    /// Encodes and queues `event`.
    ///
    /// # Errors
    ///
    /// See [`SseStream::send_frame`].
    pub fn send(&self, event: &SseEvent) -> Result<(), RealtimeError> {
        self.send_frame(event.encode())
    }

    /// Queues an unnamed event carrying `data`.
    ///
    /// # Errors
    ///
    /// See [`SseStream::send_frame`].
    pub fn send_data(&self, data: impl Into<SseData>) -> Result<(), RealtimeError> {
        self.send(&SseEvent::new(data))
    }

    /// Queues an event named `name` carrying `data`.
    ///
    /// # Errors
    ///
    /// See [`SseStream::send_frame`].
    pub fn send_event(&self, name: &str, data: impl Into<SseData>) -> Result<(), RealtimeError> {
        self.send(&SseEvent::new(data).with_event(name))
    }

    /// Queues an unnamed event whose data is `value` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if `value` cannot be
    /// serialized; otherwise see [`SseStream::send_frame`].
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), RealtimeError> {
        self.send(&SseEvent::json(value)?)
    }

    /// Queues a comment, which clients ignore.
    ///
    /// # Errors
    ///
    /// See [`SseStream::send_frame`].
    pub fn send_comment(&self, text: &str) -> Result<(), RealtimeError> {
        self.send_frame(comment(text))
    }

    /// Closes the stream: the body ends after the frames already queued.
    ///
    /// Only the first call has any effect; it publishes a stream-closed
    /// event.
    pub fn close(&self) -> bool {
        let Some(sender) = self.outbound.lock().take() else {
            return false;
        };
        drop(sender);
        self.closed.send_replace(true);
        self.events.publish(ConnectionEvent::sse_closed(self.id));
        tracing::debug!(conn_id = %self.id, "sse stream closed");
        true
    }

    /// Returns `true` once the stream has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.lock().is_none()
    }

    /// Resolves once the stream is closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Client for SseStream {
    type Payload = Bytes;
    const TRANSPORT: Transport = Transport::Sse;

    fn id(&self) -> ConnId {
        self.id
    }

    fn deliver(&self, payload: &Bytes) -> Result<(), RealtimeError> {
        self.send_frame(payload.clone())
    }

    fn farewell(&self) {
        let _ = self.send_event("shutdown", "server shutting down");
    }

    fn close(&self) -> bool {
        Self::close(self)
    }

    fn is_closed(&self) -> bool {
        Self::is_closed(self)
    }
}

impl Hub<SseStream> {
    /// Encodes `event` once and broadcasts it to every stream.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubNotRunning`] if the hub no longer accepts
    /// broadcasts.
    pub async fn broadcast_event(&self, event: &SseEvent) -> Result<(), RealtimeError> {
        let frame = event.encode();
        self.broadcast(frame).await
    }

    /// Broadcasts an unnamed event carrying `data`.
    ///
    /// # Errors
    ///
    /// See [`Hub::broadcast_event`].
    pub async fn broadcast_data(&self, data: impl Into<SseData>) -> Result<(), RealtimeError> {
        let frame = SseEvent::new(data).encode();
        self.broadcast(frame).await
    }

    /// Broadcasts an event named `name` carrying `data`.
    ///
    /// # Errors
    ///
    /// See [`Hub::broadcast_event`].
    pub async fn broadcast_named(
        &self,
        name: &str,
        data: impl Into<SseData>,
    ) -> Result<(), RealtimeError> {
        let frame = SseEvent::new(data).with_event(name).encode();
        self.broadcast(frame).await
    }

    /// Encodes `event` once and sends it to every member of `room`.
    /// Returns the number of members it was queued for.
    pub async fn broadcast_event_to_room(&self, room: &str, event: &SseEvent) -> usize {
        let frame = event.encode();
        self.broadcast_to_room(room, &frame).await
    }
}

/// Consumer side of a stream's frame queue, used as the response body.
///
/// Dropping it closes the stream.
#[derive(Debug)]
pub struct SseBody {
    frames: mpsc::Receiver<Bytes>,
    stream: Arc<SseStream>,
}

impl SseBody {
    /// Returns the stream this body drains.
    #[must_use]
    pub fn stream(&self) -> &Arc<SseStream> {
        &self.stream
    }

    /// Waits for the next frame; `None` once the stream is closed and
    /// drained.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Converts into a streaming HTTP body.
    #[must_use]
    pub fn into_body(self) -> Body {
        Body::from_stream(futures_util::stream::unfold(self, |mut body| async move {
            let frame = body.next_frame().await?;
            Some((Ok::<_, Infallible>(frame), body))
        }))
    }
}

impl Drop for SseBody {
    fn drop(&mut self) {
        self.stream.close();
    }
}
