//! Server-Sent Events wire encoding.
//!
//! An event is a block of `field: value` lines terminated by a blank line:
//!
//! ```text
//! event: welcome
//! id: 42
//! retry: 3000
//! data: first line
//! data: second line
//!
//! ```
//!
//! Absent fields are omitted. Multi-line data becomes one `data:` line per
//! line, where `\r\n`, `\r` and `\n` all end a line. Comments (`: text`) are ignored by clients and serve as heartbeats.

use std::borrow::Cow;

use axum::body::Bytes;
use serde::Serialize;

use crate::error::RealtimeError;

/// The `data` payload of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseData {
    /// Text, sent as is.
    Text(String),
    /// Raw bytes, sent unchanged apart from line breaks. Clients decode the
    /// stream as UTF-8, so invalid sequences reach them as U+FFFD.
    Bytes(Bytes),
    /// JSON value, sent in compact form.
    Json(serde_json::Value),
}

impl SseData {
    fn render(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_bytes()),
            Self::Bytes(bytes) => Cow::Borrowed(bytes.as_ref()),
            Self::Json(value) => Cow::Owned(value.to_string().into_bytes()),
        }
    }
}

impl Default for SseData {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for SseData {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for SseData {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for SseData {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for SseData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<serde_json::Value> for SseData {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// One Server-Sent Event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseEvent {
    /// Event name (`event:`); clients dispatch unnamed events as `message`.
    pub event: Option<String>,
    /// Event identifier (`id:`); echoed back by clients as `Last-Event-ID`.
    pub id: Option<String>,
    /// Reconnection delay in milliseconds (`retry:`).
    pub retry: Option<u64>,
    /// Payload.
    pub data: SseData,
}

impl SseEvent {
    /// Creates an unnamed event carrying `data`.
    #[must_use]
    pub fn new(data: impl Into<SseData>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Creates an event whose data is `value` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if `value` cannot be
    /// serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, RealtimeError> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Sets the event name.
    #[must_use]
    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }

    /// Sets the event identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the reconnection delay.
    #[must_use]
    pub fn with_retry(mut self, millis: u64) -> Self {
        self.retry = Some(millis);
        self
    }

    /// Encodes the event as a complete wire block.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::new();
        if let Some(event) = self.event.as_deref().filter(|e| !e.is_empty()) {
            push_field(&mut out, "event", event);
        }
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            push_field(&mut out, "id", id);
        }
        if let Some(retry) = self.retry.filter(|r| *r > 0) {
            out.extend_from_slice(format!("retry: {retry}\n").as_bytes());
        }

        let data = self.data.render();
        let lines = split_lines(&data);
        if lines.is_empty() {
            out.extend_from_slice(b"data: \n");
        }
        for line in lines {
            out.extend_from_slice(b"data: ");
            out.extend_from_slice(line);
            out.push(b'\n');
        }
        out.push(b'\n');
        Bytes::from(out)
    }
}

/// Encodes a comment block, one `: ` line per line of `text`.
#[must_use]
pub fn comment(text: &str) -> Bytes {
    let lines = split_lines(text.as_bytes());
    let mut out = Vec::new();
    if lines.is_empty() {
        out.extend_from_slice(b":\n");
    }
    for line in lines {
        out.extend_from_slice(b": ");
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out.push(b'\n');
    Bytes::from(out)
}

/// Encodes a standalone `retry:` directive.
#[must_use]
pub fn retry_directive(millis: u64) -> Bytes {
    Bytes::from(format!("retry: {millis}\n\n"))
}

/// Appends a single-line field, dropping line breaks that would end it early.
fn push_field(out: &mut Vec<u8>, name: &str, value: &str) {
    let value = value.replace(['\r', '\n'], "");
    out.extend_from_slice(format!("{name}: {value}\n").as_bytes());
}

/// Splits `data` into lines ended by `\r\n`, `\r` or `\n`. A trailing line
/// break does not produce an empty last line.
fn split_lines(mut data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    while !data.is_empty() {
        let Some(end) = data.iter().position(|b| matches!(b, b'\r' | b'\n')) else {
            lines.push(data);
            break;
        };
        let (line, rest) = data.split_at(end);
        lines.push(line);
        let skip = if rest.starts_with(b"\r\n") { 2 } else { 1 };
        data = rest.get(skip..).unwrap_or_default();
    }
    lines
}
