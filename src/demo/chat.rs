//! Chat over WebSocket with room join/leave/say commands.

use std::sync::Arc;

use crate::ws::messages::{ANONYMOUS, ChatMessage, ClientCommand, ServerMessage};
use crate::ws::{Frame, FrameHandler, WsConnection, WsHub};

/// Handles chat frames.
///
/// JSON frames matching [`ClientCommand`] are executed; anything else is
/// broadcast to everyone as an anonymous [`ChatMessage`].
#[derive(Debug, Clone)]
pub struct ChatHandler {
    hub: WsHub,
}

impl ChatHandler {
    /// Creates a handler that fans messages out through `hub`.
    #[must_use]
    pub fn new(hub: WsHub) -> Self {
        Self { hub }
    }

    async fn execute(&self, conn: &Arc<WsConnection>, command: ClientCommand) {
        match command {
            ClientCommand::Join { room } => {
                if room.trim().is_empty() {
                    reply(conn, &ServerMessage::error("room name must not be empty"));
                } else if self.hub.join_room(conn, &room).await {
                    let members = self.hub.room_count(&room).await;
                    reply(conn, &ServerMessage::Joined { room, members });
                } else {
                    reply(conn, &ServerMessage::error("connection is not registered"));
                }
            }
            ClientCommand::Leave { room } => {
                if self.hub.leave_room(conn, &room).await {
                    reply(conn, &ServerMessage::Left { room });
                } else {
                    reply(conn, &ServerMessage::error(format!("not a member of {room}")));
                }
            }
            ClientCommand::Say {
                room,
                content,
                user,
            } => {
                let user = user.unwrap_or_else(|| ANONYMOUS.to_string());
                self.say(conn, ChatMessage::new(user, content, room)).await;
            }
        }
    }

    async fn say(&self, conn: &Arc<WsConnection>, message: ChatMessage) {
        let result = match message.room.clone() {
            Some(room) => self
                .hub
                .broadcast_json_to_room(&room, &message)
                .await
                .map(drop),
            None => self.hub.broadcast_json(&message).await,
        };
        if let Err(e) = result {
            tracing::warn!(conn_id = %conn.id(), error = %e, "chat broadcast failed");
            reply(conn, &ServerMessage::error(e.to_string()));
        }
    }
}

impl FrameHandler for ChatHandler {
    async fn on_frame(&self, conn: &Arc<WsConnection>, frame: Frame) {
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
        };
        match serde_json::from_str::<ClientCommand>(&text) {
            Ok(command) => self.execute(conn, command).await,
            Err(_) => self.say(conn, ChatMessage::new(ANONYMOUS, text, None)).await,
        }
    }
}

fn reply(conn: &WsConnection, message: &ServerMessage) {
    if let Err(e) = conn.send_json(message) {
        tracing::debug!(conn_id = %conn.id(), error = %e, "chat reply dropped");
    }
}
