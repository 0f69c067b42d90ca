//! WebSocket connection wrapper and its read/write loops.
//!
//! A [`WsConnection`] owns the producer side of a bounded outbound queue and
//! the closed flag. Two tasks serve each socket: [`read_loop`] receives
//! frames under an inactivity deadline and hands them to a
//! [`FrameHandler`]; [`write_loop`] drains the queue into the socket under a
//! per-write deadline and pings on an idle timer. The tasks share nothing
//! but the queue and the closed flag.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, close_code};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::service::FrameHandler;
use crate::config::WsConfig;
use crate::error::RealtimeError;
use crate::hub::{Client, ConnId, ConnectionEvent, EventBus, Hub, Transport};

/// Hub of WebSocket connections.
pub type WsHub = Hub<WsConnection>;

/// Shortest keep-alive period the write loop will schedule.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(10);

/// An inbound data frame handed to a [`FrameHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Returns the frame as text, if it is a text frame.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the frame payload as raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }
}

/// One live WebSocket client.
#[derive(Debug)]
pub struct WsConnection {
    id: ConnId,
    /// Producer side of the outbound queue; `None` once closed.
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    closed: watch::Sender<bool>,
    capacity: usize,
}

impl WsConnection {
    /// Creates a connection with an outbound queue of `capacity` messages.
    ///
    /// Returns the connection and the consumer side of its queue, which
    /// belongs to [`write_loop`].
    #[must_use]
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);
        let conn = Arc::new(Self {
            id: ConnId::new(),
            outbound: Mutex::new(Some(tx)),
            closed,
            capacity,
        });
        (conn, rx)
    }

    /// Returns the connection identifier.
    #[must_use]
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Enqueues `message` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ConnectionClosed`] once the connection is
    /// closed, or [`RealtimeError::Backpressure`] if the queue is full. The
    /// message is dropped in both cases.
    pub fn send(&self, message: Message) -> Result<(), RealtimeError> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(RealtimeError::ConnectionClosed);
        };
        tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RealtimeError::Backpressure {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => RealtimeError::ConnectionClosed,
        })
    }

    /// Enqueues a text frame.
    ///
    /// # Errors
    ///
    /// See [`WsConnection::send`].
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), RealtimeError> {
        self.send(Message::text(text.into()))
    }

    /// Enqueues a binary frame.
    ///
    /// # Errors
    ///
    /// See [`WsConnection::send`].
    pub fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), RealtimeError> {
        self.send(Message::binary(data.into()))
    }

    /// Serializes `value` to JSON and enqueues it as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if `value` cannot be
    /// serialized; otherwise see [`WsConnection::send`].
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), RealtimeError> {
        let json = serde_json::to_string(value)?;
        self.send_text(json)
    }

    /// Closes the connection.
    ///
    /// Releases the outbound queue, which makes [`write_loop`] flush what is
    /// already queued, send a close frame and shut the socket; and wakes
    /// [`read_loop`]. Only the first call has any effect.
    pub fn close(&self) -> bool {
        let Some(sender) = self.outbound.lock().take() else {
            return false;
        };
        drop(sender);
        self.closed.send_replace(true);
        tracing::debug!(conn_id = %self.id, "ws connection closed");
        true
    }

    /// Returns `true` once [`WsConnection::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.lock().is_none()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Client for WsConnection {
    type Payload = Message;
    const TRANSPORT: Transport = Transport::WebSocket;

    fn id(&self) -> ConnId {
        self.id
    }

    fn deliver(&self, payload: &Message) -> Result<(), RealtimeError> {
        self.send(payload.clone())
    }

    fn farewell(&self) {
        let _ = self.send(Message::Close(Some(CloseFrame {
            code: close_code::AWAY,
            reason: Utf8Bytes::from_static("server shutdown"),
        })));
    }

    fn close(&self) -> bool {
        Self::close(self)
    }

    fn is_closed(&self) -> bool {
        Self::is_closed(self)
    }
}

impl Hub<WsConnection> {
    /// Broadcasts a text frame to every connection.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubNotRunning`] if the hub no longer accepts
    /// broadcasts.
    pub async fn broadcast_text(&self, text: impl Into<String>) -> Result<(), RealtimeError> {
        let message = Message::text(text.into());
        self.broadcast(message).await
    }

    /// Serializes `value` once and broadcasts it as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] or
    /// [`RealtimeError::HubNotRunning`].
    pub async fn broadcast_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), RealtimeError> {
        let message = Message::text(serde_json::to_string(value)?);
        self.broadcast(message).await
    }

    /// Sends a text frame to every member of `room`. Returns the number of
    /// members it was enqueued for.
    pub async fn broadcast_text_to_room(&self, room: &str, text: impl Into<String>) -> usize {
        let message = Message::text(text.into());
        self.broadcast_to_room(room, &message).await
    }

    /// Serializes `value` once and sends it to every member of `room`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if `value` cannot be
    /// serialized.
    pub async fn broadcast_json_to_room<T: Serialize + ?Sized>(
        &self,
        room: &str,
        value: &T,
    ) -> Result<usize, RealtimeError> {
        let message = Message::text(serde_json::to_string(value)?);
        Ok(self.broadcast_to_room(room, &message).await)
    }
}

/// Receives frames until the peer goes away, a read fails, the inactivity
/// deadline elapses, or the connection is closed locally.
///
/// Every received frame, including pongs, refreshes the deadline. Data
/// frames are passed to `handler` in order. On exit the connection is
/// closed and a disconnect event is published.
pub async fn read_loop<S, E, H>(
    conn: Arc<WsConnection>,
    mut inbound: S,
    handler: &H,
    config: &WsConfig,
    events: &EventBus,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    H: FrameHandler,
{
    let id = conn.id();
    loop {
        let next = tokio::select! {
            () = conn.closed() => break,
            next = tokio::time::timeout(config.read_timeout, inbound.next()) => next,
        };

        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                tracing::debug!(conn_id = %id, error = %e, "ws read failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(conn_id = %id, timeout = ?config.read_timeout, "ws read deadline elapsed");
                break;
            }
        };

        match message {
            Message::Text(text) => handler.on_frame(&conn, Frame::Text(text.as_str().to_owned())).await,
            Message::Binary(data) => handler.on_frame(&conn, Frame::Binary(data)).await,
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(frame) => {
                tracing::debug!(conn_id = %id, ?frame, "ws peer sent close");
                break;
            }
        }
    }

    conn.close();
    events.publish(ConnectionEvent::ws_disconnected(id));
}

/// Drains the outbound queue into `sink` until the queue is released or a
/// write fails, pinging whenever `ping_interval` elapses.
///
/// Every write is bounded by `write_timeout`. A queued close frame is the
/// last thing written; when the queue is released without one, an empty
/// close frame is sent instead. On exit the connection is closed and the
/// sink is shut.
pub async fn write_loop<K>(
    conn: Arc<WsConnection>,
    mut sink: K,
    mut outbound: mpsc::Receiver<Message>,
    config: WsConfig,
) where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let id = conn.id();
    let period = config.ping_interval.max(MIN_PING_INTERVAL);
    let mut keep_alive = tokio::time::interval_at(Instant::now() + period, period);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(message) = next else {
                    let _ = write_frame(&mut sink, Message::Close(None), config.write_timeout).await;
                    break;
                };
                let is_close = matches!(message, Message::Close(_));
                if let Err(e) = write_frame(&mut sink, message, config.write_timeout).await {
                    tracing::debug!(conn_id = %id, error = %e, "ws write failed");
                    break;
                }
                if is_close {
                    break;
                }
            }
            _ = keep_alive.tick() => {
                if let Err(e) = write_frame(&mut sink, Message::Ping(Bytes::new()), config.write_timeout).await {
                    tracing::debug!(conn_id = %id, error = %e, "ws ping failed");
                    break;
                }
            }
        }
    }

    conn.close();
    let _ = tokio::time::timeout(config.write_timeout, sink.close()).await;
}

/// Writes one frame, failing if it takes longer than `deadline`.
async fn write_frame<K>(sink: &mut K, message: Message, deadline: Duration) -> Result<(), RealtimeError>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    match tokio::time::timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RealtimeError::Transport(e.to_string())),
        Err(_) => Err(RealtimeError::Transport(format!(
            "write timed out after {deadline:?}"
        ))),
    }
}
