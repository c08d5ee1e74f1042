//! Wire envelopes for the chat protocol.
//!
//! Outgoing frames are fixed JSON shapes. Incoming frames stay raw
//! `serde_json::Value`s routed by their `type` field, so fields the server
//! adds beyond the envelope (usernames, timestamps, message ids) pass
//! through to listeners verbatim.

use banter_common::errors::{BanterError, SocketError};
use serde::Serialize;
use serde_json::Value;

/// Envelope `type` names used on the wire.
pub mod kinds {
    pub const MESSAGE: &str = "message";
    pub const TYPING: &str = "typing";
    pub const USER_STATUS: &str = "user_status";
    pub const USER_ONLINE_STATUS: &str = "user_online_status";
}

// ---------------------------------------------------------------------------
// Outgoing frames
// ---------------------------------------------------------------------------

/// An outgoing client frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// A chat message send.
    Message { message: String, sender_id: String },
    /// A typing-state change.
    Typing { is_typing: bool },
}

impl ClientFrame {
    /// Serialize to the JSON text sent on the socket.
    pub fn to_json(&self) -> Result<String, SocketError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Incoming frames
// ---------------------------------------------------------------------------

/// Category of an incoming envelope, decided by its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A chat message from the room.
    Message,
    /// Another participant's typing-state change.
    Typing,
    /// A join/leave status event scoped to the room.
    UserStatus,
    /// A status event from the global presence feed.
    UserOnlineStatus,
    /// Anything else; dropped without dispatch.
    Unknown,
}

impl EventKind {
    /// Classify a parsed envelope. Envelopes without a string `type` field
    /// are `Unknown`.
    pub fn of(envelope: &Value) -> Self {
        match envelope.get("type").and_then(Value::as_str) {
            Some(kinds::MESSAGE) => Self::Message,
            Some(kinds::TYPING) => Self::Typing,
            Some(kinds::USER_STATUS) => Self::UserStatus,
            Some(kinds::USER_ONLINE_STATUS) => Self::UserOnlineStatus,
            _ => Self::Unknown,
        }
    }
}

/// Parse an incoming text frame into an envelope.
pub fn parse_envelope(text: &str) -> Result<Value, BanterError> {
    serde_json::from_str(text).map_err(|e| BanterError::Protocol(e.to_string()))
}
