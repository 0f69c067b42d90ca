//! WebSocket chat message types: client commands and server messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used for chat messages from clients that have none.
pub const ANONYMOUS: &str = "Anonymous";

/// Commands that a client can send over the chat socket.
///
/// Frames that do not parse as a command are treated as plain chat text
/// for everyone.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Join a room.
    Join {
        /// Room name.
        room: String,
    },
    /// Leave a room.
    Leave {
        /// Room name.
        room: String,
    },
    /// Say something, to one room or to everyone.
    Say {
        /// Target room; everyone when absent.
        #[serde(default)]
        room: Option<String>,
        /// Message text.
        content: String,
        /// Optional display name.
        #[serde(default)]
        user: Option<String>,
    },
}

/// A chat line fanned out to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the sender.
    pub user: String,
    /// Message text.
    pub content: String,
    /// Room the message was sent to, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room: Option<String>,
    /// Wall-clock time the server accepted the message.
    pub time: String,
}

impl ChatMessage {
    /// Creates a message stamped with the current time (`HH:MM:SS`, UTC).
    #[must_use]
    pub fn new(user: impl Into<String>, content: impl Into<String>, room: Option<String>) -> Self {
        Self {
            user: user.into(),
            content: content.into(),
            room,
            time: Utc::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// Direct replies to a single client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The client joined `room`.
    Joined {
        /// Room name.
        room: String,
        /// Members after the join.
        members: usize,
    },
    /// The client left `room`.
    Left {
        /// Room name.
        room: String,
    },
    /// A command could not be carried out.
    Error {
        /// Human-readable reason.
        message: String,
        /// When the error occurred.
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    /// Builds an error reply stamped with the current time.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_command() {
        let Ok(cmd) = serde_json::from_str::<ClientCommand>(r#"{"command":"join","room":"lobby"}"#) else {
            panic!("join should parse");
        };
        assert_eq!(cmd, ClientCommand::Join { room: "lobby".to_string() });
    }

    #[test]
    fn say_defaults_to_everyone() {
        let Ok(ClientCommand::Say { room, content, user }) =
            serde_json::from_str::<ClientCommand>(r#"{"command":"say","content":"hey"}"#)
        else {
            panic!("say should parse");
        };
        assert_eq!(room, None);
        assert_eq!(user, None);
        assert_eq!(content, "hey");
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(serde_json::from_str::<ClientCommand>("hello world").is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"command":"dance"}"#).is_err());
    }

    #[test]
    fn chat_message_omits_missing_room() {
        let msg = ChatMessage::new(ANONYMOUS, "hi", None);
        let Ok(value) = serde_json::to_value(&msg) else {
            panic!("serialize");
        };
        assert_eq!(value["user"], "Anonymous");
        assert_eq!(value["content"], "hi");
        assert!(value.get("room").is_none());
        assert_eq!(msg.time.len(), 8);
    }

    #[test]
    fn server_messages_are_tagged() {
        let Ok(value) = serde_json::to_value(ServerMessage::Joined {
            room: "lobby".to_string(),
            members: 2,
        }) else {
            panic!("serialize");
        };
        assert_eq!(value["type"], "joined");
        assert_eq!(value["members"], 2);
    }
}
