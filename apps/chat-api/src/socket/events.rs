//! Chat event names and wire-format frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names used on the socket, a closed enumeration shared with clients.
pub struct EventName;

impl EventName {
    /// Acknowledgment sent to a connection once its handshake succeeds.
    pub const CONNECTED: &'static str = "connected";
    /// Client asks to join a chat room (payload: chat id).
    pub const JOIN_CHAT: &'static str = "joinChat";
    /// Client asks to leave a chat room (payload: chat id).
    pub const LEAVE_CHAT: &'static str = "leaveChat";
    /// Typing indicator, relayed to the other members of the chat room.
    pub const TYPING: &'static str = "typing";
    /// Typing stopped, relayed like [`Self::TYPING`].
    pub const STOP_TYPING: &'static str = "stopTyping";
    /// A new chat was created (payload: chat object).
    pub const NEW_CHAT: &'static str = "newChat";
    /// A message was persisted (payload: message object).
    pub const MESSAGE_RECEIVED: &'static str = "messageReceived";
    /// A message was deleted (payload: message object, content cleared).
    pub const MESSAGE_DELETED: &'static str = "messageDeleted";
    /// Group chat metadata changed (payload: chat object).
    pub const UPDATE_GROUP: &'static str = "updateGroup";
    /// A participant was added to a group chat (payload: chat object).
    pub const PARTICIPANT_JOINED: &'static str = "participantJoined";
    /// A participant left or was removed (payload: chat object).
    pub const PARTICIPANT_LEFT: &'static str = "participantLeft";
    /// Handshake or connection error surfaced to the client.
    pub const SOCKET_ERROR: &'static str = "socketError";
}

// ---------------------------------------------------------------------------
// Server → Client frame
// ---------------------------------------------------------------------------

/// A frame sent from the server to the client over the socket.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl ServerFrame {
    pub fn new(event: &str, payload: Value) -> Self {
        Self {
            event: event.to_string(),
            payload,
        }
    }

    /// Build the `connected` acknowledgment (no payload).
    pub fn connected() -> Self {
        Self::new(EventName::CONNECTED, Value::Null)
    }

    /// Build a `socketError` frame carrying a message string.
    pub fn error(message: &str) -> Self {
        Self::new(EventName::SOCKET_ERROR, Value::String(message.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Client → Server frame
// ---------------------------------------------------------------------------

/// A frame received from the client over the socket.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl ClientFrame {
    /// The chat id carried by a room-scoped command, if present.
    pub fn chat_id(&self) -> Option<&str> {
        self.payload.as_str()
    }
}
