//! Event-stream endpoint service: opens streams and keeps them alive.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderName,
};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use tokio::time::{Instant, MissedTickBehavior};

use super::stream::{SseBody, SseHub, SseStream};
use crate::config::SseConfig;
use crate::error::RealtimeError;
use crate::hub::EventBus;

/// Request header carrying the client's resume cursor.
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Shortest heartbeat period the supervisor will schedule.
const MIN_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Application callback invoked once per opened stream.
pub trait StreamHandler: Debug + Send + Sync + 'static {
    /// Called after the stream is registered and before heartbeats start.
    fn on_open(&self, stream: &Arc<SseStream>) -> impl Future<Output = ()> + Send;
}

/// Serves event streams for one endpoint.
#[derive(Debug)]
pub struct SseService<H> {
    handler: Arc<H>,
    hub: Option<SseHub>,
    config: SseConfig,
    events: EventBus,
}

impl<H: StreamHandler> SseService<H> {
    /// Creates a standalone service.
    #[must_use]
    pub fn new(handler: H, config: SseConfig, events: EventBus) -> Self {
        Self {
            handler: Arc::new(handler),
            hub: None,
            config,
            events,
        }
    }

    /// Attaches streams served by this endpoint to `hub`.
    #[must_use]
    pub fn with_hub(mut self, hub: SseHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Returns the attached hub, if any.
    #[must_use]
    pub fn hub(&self) -> Option<&SseHub> {
        self.hub.as_ref()
    }

    /// Opens a stream for a request with `headers` and returns the
    /// streaming response.
    ///
    /// The handler and the heartbeat run on a background task that lives
    /// until the stream closes, after which the stream is unregistered.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubNotRunning`] if the attached hub refuses
    /// the registration.
    pub async fn open(self: &Arc<Self>, headers: &HeaderMap) -> Result<Response, RealtimeError> {
        let last_event_id = headers
            .get(LAST_EVENT_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        let (stream, body) = SseStream::open(&self.config, last_event_id, self.events.clone());
        if let Some(hub) = &self.hub {
            hub.register(Arc::clone(&stream)).await?;
        }
        tracing::info!(conn_id = %stream.id(), reconnect = stream.is_reconnect(), "sse stream accepted");

        tokio::spawn(Arc::clone(self).supervise(stream));
        Ok(event_stream_response(body))
    }

    /// Runs the handler, then sends heartbeat comments until the stream
    /// closes.
    async fn supervise(self: Arc<Self>, stream: Arc<SseStream>) {
        self.handler.on_open(&stream).await;

        let period = self.config.keep_alive_interval.max(MIN_KEEP_ALIVE_INTERVAL);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = stream.closed() => break,
                _ = heartbeat.tick() => {
                    if let Err(e) = stream.send_comment("keep-alive") {
                        tracing::debug!(conn_id = %stream.id(), error = %e, "sse heartbeat failed");
                        break;
                    }
                }
            }
        }

        match &self.hub {
            Some(hub) => hub.unregister(Arc::clone(&stream)),
            None => {
                stream.close();
            }
        }
        tracing::info!(conn_id = %stream.id(), "sse stream finished");
    }
}

/// Wraps `body` in a response with the event-stream headers.
fn event_stream_response(body: SseBody) -> Response {
    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            // Stops nginx-style proxies from buffering the stream.
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body.into_body(),
    )
        .into_response()
}
