//! Live event feed over Server-Sent Events.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sse::{SseEvent, SseHub, SseStream, StreamHandler};

/// Interval between `time` events.
pub const CLOCK_INTERVAL: Duration = Duration::from_secs(5);

/// Greets each new stream with a `welcome` event.
///
/// Reconnecting clients also learn which cursor they resumed from.
#[derive(Debug, Clone, Copy, Default)]
pub struct WelcomeHandler;

impl StreamHandler for WelcomeHandler {
    async fn on_open(&self, stream: &Arc<SseStream>) {
        let mut data = json!({
            "message": "Connected to SSE stream",
            "time": Utc::now().to_rfc3339(),
        });
        if let (Some(cursor), Some(fields)) = (stream.last_event_id(), data.as_object_mut()) {
            fields.insert("resumed_from".to_string(), json!(cursor));
        }
        let event = SseEvent::new(data).with_event("welcome");
        if let Err(e) = stream.send(&event) {
            tracing::debug!(conn_id = %stream.id(), error = %e, "welcome dropped");
        }
    }
}

/// Broadcasts a `time` event to every stream each `period` until the hub
/// stops accepting broadcasts.
pub fn spawn_clock(hub: SseHub, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sequence: u64 = 0;
        loop {
            tokio::select! {
                () = hub.stopped() => break,
                _ = ticker.tick() => {
                    sequence += 1;
                    let event = SseEvent::new(json!({ "time": Utc::now().to_rfc3339() }))
                        .with_event("time")
                        .with_id(sequence.to_string());
                    if hub.broadcast_event(&event).await.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(ticks = sequence, "clock stopped");
    })
}
