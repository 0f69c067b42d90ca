//! Server, hub and transport configuration.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), falling back to the defaults below.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::RealtimeError;

/// Capacity of hub broadcast channels and per-connection outbound queues.
pub const DEFAULT_BUFFER_SIZE: usize = 256;
/// Default capacity of the lifecycle event bus.
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;
/// Default deadline for a hub shutdown.
pub const DEFAULT_HUB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest inbound WebSocket message accepted (512 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// Default WebSocket read buffer size in bytes.
pub const DEFAULT_WS_READ_BUFFER_SIZE: usize = 1024;
/// Default WebSocket write buffer size in bytes.
pub const DEFAULT_WS_WRITE_BUFFER_SIZE: usize = 1024;
/// Default interval between server pings.
pub const DEFAULT_WS_PING_INTERVAL: Duration = Duration::from_secs(30);
/// Default deadline for a single WebSocket write.
pub const DEFAULT_WS_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default inactivity deadline for WebSocket reads.
pub const DEFAULT_WS_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default `retry:` directive sent when a stream opens, in milliseconds.
pub const DEFAULT_SSE_RETRY_INTERVAL_MS: u64 = 3000;
/// Default interval between heartbeat comments on an event stream.
pub const DEFAULT_SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Hub tuning.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the broadcast and registration channels.
    pub buffer_size: usize,
    /// Deadline used by callers that shut the hub down with defaults.
    pub shutdown_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            shutdown_timeout: DEFAULT_HUB_SHUTDOWN_TIMEOUT,
        }
    }
}

/// WebSocket transport settings.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Read buffer size handed to the upgrade.
    pub read_buffer_size: usize,
    /// Write buffer size handed to the upgrade.
    pub write_buffer_size: usize,
    /// Largest inbound message accepted.
    pub max_message_size: usize,
    /// Capacity of each connection's outbound queue.
    pub send_buffer: usize,
    /// Interval between keep-alive pings.
    pub ping_interval: Duration,
    /// Deadline for each write, including pings and close frames.
    pub write_timeout: Duration,
    /// Inactivity deadline; refreshed by every inbound frame, pongs included.
    pub read_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_WS_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WS_WRITE_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            send_buffer: DEFAULT_BUFFER_SIZE,
            ping_interval: DEFAULT_WS_PING_INTERVAL,
            write_timeout: DEFAULT_WS_WRITE_TIMEOUT,
            read_timeout: DEFAULT_WS_READ_TIMEOUT,
        }
    }
}

impl WsConfig {
    /// Checks that the settings can keep a healthy connection alive.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidRequest`] if a queue capacity or
    /// timeout is zero, or if the ping interval is not shorter than the
    /// read timeout (a healthy peer would then be dropped between pings).
    pub fn validate(&self) -> Result<(), RealtimeError> {
        if self.send_buffer == 0 {
            return Err(RealtimeError::InvalidRequest(
                "ws send buffer must be positive".to_string(),
            ));
        }
        if self.ping_interval.is_zero() || self.write_timeout.is_zero() {
            return Err(RealtimeError::InvalidRequest(
                "ws ping interval and write timeout must be positive".to_string(),
            ));
        }
        if self.ping_interval >= self.read_timeout {
            return Err(RealtimeError::InvalidRequest(format!(
                "ws ping interval ({:?}) must be shorter than read timeout ({:?})",
                self.ping_interval, self.read_timeout
            )));
        }
        Ok(())
    }
}

/// Server-Sent Events transport settings.
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// `retry:` directive sent once when the stream opens (0 disables it).
    pub retry_interval_ms: u64,
    /// Interval between heartbeat comments.
    pub keep_alive_interval: Duration,
    /// Capacity of each stream's outbound frame queue.
    pub buffer_size: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: DEFAULT_SSE_RETRY_INTERVAL_MS,
            keep_alive_interval: DEFAULT_SSE_KEEP_ALIVE_INTERVAL,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,
    /// Capacity of the lifecycle event bus.
    pub event_bus_capacity: usize,
    /// Whether logs are emitted as JSON lines.
    pub log_json: bool,
    /// Hub settings shared by both transports.
    pub hub: HubConfig,
    /// WebSocket settings.
    pub ws: WsConfig,
    /// Server-Sent Events settings.
    pub sse: SseConfig,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is missing or unparsable.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as a
    /// [`SocketAddr`], or if the resulting WebSocket settings are invalid.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let buffer_size = parse_env("HUB_BUFFER_SIZE", DEFAULT_BUFFER_SIZE).max(1);

        let hub = HubConfig {
            buffer_size,
            shutdown_timeout: parse_env_secs("HUB_SHUTDOWN_TIMEOUT_SECS", DEFAULT_HUB_SHUTDOWN_TIMEOUT),
        };

        let ws = WsConfig {
            read_buffer_size: parse_env("WS_READ_BUFFER_SIZE", DEFAULT_WS_READ_BUFFER_SIZE),
            write_buffer_size: parse_env("WS_WRITE_BUFFER_SIZE", DEFAULT_WS_WRITE_BUFFER_SIZE),
            max_message_size: parse_env("WS_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE),
            send_buffer: buffer_size,
            ping_interval: parse_env_secs("WS_PING_INTERVAL_SECS", DEFAULT_WS_PING_INTERVAL),
            write_timeout: parse_env_secs("WS_WRITE_TIMEOUT_SECS", DEFAULT_WS_WRITE_TIMEOUT),
            read_timeout: parse_env_secs("WS_READ_TIMEOUT_SECS", DEFAULT_WS_READ_TIMEOUT),
        };
        ws.validate()?;

        let sse = SseConfig {
            retry_interval_ms: parse_env("SSE_RETRY_INTERVAL_MS", DEFAULT_SSE_RETRY_INTERVAL_MS),
            keep_alive_interval: parse_env_secs(
                "SSE_KEEP_ALIVE_INTERVAL_SECS",
                DEFAULT_SSE_KEEP_ALIVE_INTERVAL,
            ),
            buffer_size: parse_env("SSE_BUFFER_SIZE", buffer_size).max(1),
        };

        Ok(Self {
            listen_addr,
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", DEFAULT_EVENT_BUS_CAPACITY),
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
            hub,
            ws,
            sse,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable holding a positive number of seconds.
fn parse_env_secs(key: &str, default: Duration) -> Duration {
    match parse_env::<u64>(key, 0) {
        0 => default,
        secs => Duration::from_secs(secs),
    }
}
