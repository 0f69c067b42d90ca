//! Error types with HTTP status code mapping.
//!
//! [`RealtimeError`] is the central error type. Per-connection failures
//! (transport errors, backpressure, send-on-closed) are contained by the
//! hub and never reach broadcast callers; shutdown timeouts are the one
//! failure surfaced synchronously to an external caller. Each variant maps
//! to an HTTP status code so the HTTP layer can return it directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "hub is not running"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Realtime hub error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status               |
/// |-----------|---------------------|---------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request           |
/// | 2000–2999 | Hub lifecycle       | 503 / 504 / 409           |
/// | 3000–3999 | Server              | 500 Internal Server Error |
/// | 4000–4999 | Connection          | 410 Gone / 429            |
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// The connection has already been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection's outbound queue is full.
    #[error("outbound queue full (capacity {capacity})")]
    Backpressure {
        /// Capacity of the queue that overflowed.
        capacity: usize,
    },

    /// The dispatch loop did not finish draining before the deadline.
    #[error("hub shutdown timed out after {waited_ms} ms")]
    ShutdownTimeout {
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },

    /// The hub is draining or stopped and no longer accepts work.
    #[error("hub is not running")]
    HubNotRunning,

    /// The dispatch loop was already started (or the hub was shut down).
    #[error("hub already started")]
    HubAlreadyStarted,

    /// A payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transport-level read or write failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RealtimeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Serialization(_) => 1002,
            Self::HubNotRunning => 2001,
            Self::HubAlreadyStarted => 2002,
            Self::ShutdownTimeout { .. } => 2003,
            Self::Internal(_) => 3000,
            Self::Transport(_) => 3001,
            Self::ConnectionClosed => 4001,
            Self::Backpressure { .. } => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Serialization(_) => StatusCode::BAD_REQUEST,
            Self::HubNotRunning => StatusCode::SERVICE_UNAVAILABLE,
            Self::HubAlreadyStarted => StatusCode::CONFLICT,
            Self::ShutdownTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConnectionClosed => StatusCode::GONE,
            Self::Backpressure { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Returns `true` for failures that end a single connection: transport
    /// errors, overflowed queues and sends on a closed connection.
    #[must_use]
    pub const fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::Backpressure { .. } | Self::Transport(_)
        )
    }
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
