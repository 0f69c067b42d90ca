//! WebSocket endpoint service: upgrades requests and drives connections.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{Sink, Stream, StreamExt};

use super::connection::{Frame, WsConnection, WsHub, read_loop, write_loop};
use crate::config::WsConfig;
use crate::hub::{ConnectionEvent, EventBus};

/// Application callback for inbound data frames.
///
/// Called sequentially from the connection's read loop, so frames from one
/// client are handled in arrival order. A slow handler delays only its own
/// connection.
pub trait FrameHandler: Debug + Send + Sync + 'static {
    /// Handles one text or binary frame received on `conn`.
    fn on_frame(&self, conn: &Arc<WsConnection>, frame: Frame) -> impl Future<Output = ()> + Send;
}

/// Serves WebSocket connections for one endpoint.
///
/// Without a hub every connection is served standalone. With a hub
/// ([`WsService::with_hub`]) each connection is registered once the upgrade
/// completes and unregistered when its read loop ends.
#[derive(Debug)]
pub struct WsService<H> {
    handler: Arc<H>,
    hub: Option<WsHub>,
    config: WsConfig,
    events: EventBus,
}

impl<H: FrameHandler> WsService<H> {
    /// Creates a standalone service.
    #[must_use]
    pub fn new(handler: H, config: WsConfig, events: EventBus) -> Self {
        Self {
            handler: Arc::new(handler),
            hub: None,
            config,
            events,
        }
    }

    /// Attaches connections served by this endpoint to `hub`.
    #[must_use]
    pub fn with_hub(mut self, hub: WsHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Returns the attached hub, if any.
    #[must_use]
    pub fn hub(&self) -> Option<&WsHub> {
        self.hub.as_ref()
    }

    /// Returns the transport settings.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Completes the HTTP upgrade and serves the socket in the background.
    pub fn upgrade(self: &Arc<Self>, upgrade: WebSocketUpgrade) -> Response {
        let service = Arc::clone(self);
        upgrade
            .read_buffer_size(self.config.read_buffer_size)
            .write_buffer_size(self.config.write_buffer_size)
            .max_message_size(self.config.max_message_size)
            .on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
            .on_upgrade(move |socket| async move { service.serve(socket).await })
    }

    /// Serves an upgraded socket until it closes.
    pub async fn serve(&self, socket: WebSocket) {
        let (sink, stream) = socket.split();
        self.serve_transport(stream, sink).await;
    }

    /// Serves a connection over an arbitrary frame stream and sink.
    ///
    /// Spawns the write loop, runs the read loop on the calling task, and
    /// returns once both have finished.
    pub async fn serve_transport<S, E, K>(&self, inbound: S, sink: K)
    where
        S: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display + Send,
        K: Sink<Message> + Unpin + Send + 'static,
        K::Error: Display,
    {
        let (conn, outbound) = WsConnection::new(self.config.send_buffer);
        let id = conn.id();

        if let Some(hub) = &self.hub {
            if let Err(e) = hub.register(Arc::clone(&conn)).await {
                tracing::warn!(conn_id = %id, error = %e, "ws connection refused by hub");
                // Register closed the connection; let the writer send the close frame.
                write_loop(conn, sink, outbound, self.config.clone()).await;
                return;
            }
        }

        tracing::info!(conn_id = %id, "ws connection opened");
        self.events.publish(ConnectionEvent::ws_connected(id));

        let writer = tokio::spawn(write_loop(
            Arc::clone(&conn),
            sink,
            outbound,
            self.config.clone(),
        ));

        read_loop(
            Arc::clone(&conn),
            inbound,
            self.handler.as_ref(),
            &self.config,
            &self.events,
        )
        .await;

        if let Some(hub) = &self.hub {
            hub.unregister(Arc::clone(&conn));
        }
        if let Err(e) = writer.await {
            tracing::warn!(conn_id = %id, error = %e, "ws writer task failed");
        }
        tracing::info!(conn_id = %id, "ws connection finished");
    }
}
