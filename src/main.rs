//! realtime-hub demo server entry point.
//!
//! Serves a room-aware chat at `/ws/chat`, a live event feed at
//! `/sse/events` and REST info endpoints. On Ctrl-C or SIGTERM both hubs
//! notify and close their clients before the HTTP server stops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use realtime_hub::api::{self, SSE_EVENTS_PATH, WS_CHAT_PATH};
use realtime_hub::app_state::AppState;
use realtime_hub::config::ServerConfig;
use realtime_hub::demo::feed::CLOCK_INTERVAL;
use realtime_hub::demo::{ChatHandler, WelcomeHandler, spawn_clock};
use realtime_hub::hub::EventBus;
use realtime_hub::hub::event_bus::log_events;
use realtime_hub::sse::{self, SseService};
use realtime_hub::ws::{self, WsService};

/// Deadline for plain REST requests; streaming routes are not bounded.
const REST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting realtime-hub");

    // Build hubs and background tasks
    let events = EventBus::new(config.event_bus_capacity);
    let logger = tokio::spawn(log_events(events.clone()));
    let state = AppState::new(&config.hub, events.clone());
    state.spawn_hubs();
    let clock = spawn_clock(state.sse_hub.clone(), CLOCK_INTERVAL);

    // Build transport services
    let chat = Arc::new(
        WsService::new(
            ChatHandler::new(state.ws_hub.clone()),
            config.ws.clone(),
            events.clone(),
        )
        .with_hub(state.ws_hub.clone()),
    );
    let feed = Arc::new(
        SseService::new(WelcomeHandler, config.sse.clone(), events.clone())
            .with_hub(state.sse_hub.clone()),
    );
    drop(events);

    // Build router
    let app = Router::new()
        .merge(api::build_router().layer(TimeoutLayer::new(REST_TIMEOUT)))
        .merge(ws::handler::router(WS_CHAT_PATH, chat))
        .merge(sse::handler::router(SSE_EVENTS_PATH, feed))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone(), config.hub.shutdown_timeout))
        .await
        .context("server error")?;

    if let Err(e) = clock.await {
        tracing::warn!(error = %e, "clock task failed");
    }
    drop(state);
    if tokio::time::timeout(Duration::from_secs(1), logger).await.is_err() {
        tracing::debug!("event logger still running at exit");
    }
    tracing::info!("server shutdown complete");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM, then drains both hubs.
async fn shutdown_signal(state: AppState, deadline: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }

    let (ws, sse) = tokio::join!(
        state.ws_hub.shutdown(deadline),
        state.sse_hub.shutdown(deadline),
    );
    for (hub, result) in [("ws", ws), ("sse", sse)] {
        match result {
            Ok(()) => tracing::info!(hub, "hub drained"),
            Err(e) => tracing::warn!(hub, error = %e, "hub did not drain in time"),
        }
    }
}
