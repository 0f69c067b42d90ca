//! Shared harness: a real server on an ephemeral port.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use realtime_hub::api::{self, SSE_EVENTS_PATH, WS_CHAT_PATH};
use realtime_hub::app_state::AppState;
use realtime_hub::config::{HubConfig, SseConfig, WsConfig};
use realtime_hub::demo::{ChatHandler, WelcomeHandler};
use realtime_hub::hub::{Client, EventBus, Hub};
use realtime_hub::sse::{self, SseService};
use realtime_hub::ws::{self, WsService};

pub struct TestApp {
    pub addr: SocketAddr,
    pub state: AppState,
    server: JoinHandle<()>,
}

impl TestApp {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{WS_CHAT_PATH}", self.addr)
    }

    pub fn sse_url(&self) -> String {
        self.http_url(SSE_EVENTS_PATH)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub async fn spawn_app() -> TestApp {
    let events = EventBus::new(64);
    let state = AppState::new(&HubConfig::default(), events.clone());
    state.spawn_hubs();
    while !(state.ws_hub.is_running() && state.sse_hub.is_running()) {
        tokio::task::yield_now().await;
    }

    let chat = Arc::new(
        WsService::new(
            ChatHandler::new(state.ws_hub.clone()),
            WsConfig::default(),
            events.clone(),
        )
        .with_hub(state.ws_hub.clone()),
    );
    let sse_config = SseConfig {
        retry_interval_ms: 0,
        keep_alive_interval: Duration::from_millis(50),
        ..SseConfig::default()
    };
    let feed = Arc::new(
        SseService::new(WelcomeHandler, sse_config, events).with_hub(state.sse_hub.clone()),
    );

    let app = Router::new()
        .merge(api::build_router())
        .merge(ws::handler::router(WS_CHAT_PATH, chat))
        .merge(sse::handler::router(SSE_EVENTS_PATH, feed))
        .with_state(state.clone());

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("failed to bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has no address");
    };
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestApp {
        addr,
        state,
        server,
    }
}

/// Polls until `hub` has exactly `n` registered connections.
pub async fn wait_for_connections<C: Client>(hub: &Hub<C>, n: usize) {
    for _ in 0..400 {
        if hub.connection_count().await == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {n} connections, found {}",
        hub.connection_count().await
    );
}
