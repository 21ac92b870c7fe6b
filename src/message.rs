//! Message definitions
//!
//! `Payload` is what peers relay to each other: opaque, never parsed.
//! `ServerNotice` is the only thing the server itself ever says, a JSON
//! notice sent to a client right before the server closes it.

use serde::Serialize;
use tokio_tungstenite::tungstenite::Message;

use crate::error::AppError;

/// A relayed message
///
/// The frame kind is preserved end to end; contents are never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Size of the payload in bytes
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert a WebSocket data frame into a payload
    ///
    /// Returns None for control frames (ping, pong, close).
    pub fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(Payload::Text(text)),
            Message::Binary(data) => Some(Payload::Binary(data)),
            _ => None,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(data) => Message::Binary(data),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

/// Server → Client notice
///
/// Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNotice {
    /// Error occurred; the connection is about to be closed
    Error { code: ErrorCode, message: String },
}

impl ServerNotice {
    /// Encode as a text payload ready to be sent to a connection
    pub fn to_payload(&self) -> Result<Payload, AppError> {
        Ok(Payload::Text(serde_json::to_string(self)?))
    }
}

/// Error codes for ServerNotice::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Room already has 2 members
    RoomFull,
    /// Non-existent room
    RoomNotFound,
    /// No message within the idle timeout
    IdleTimeout,
    /// Anything else
    Internal,
}

/// Convert AppError to ServerNotice for client notification
impl From<AppError> for ServerNotice {
    fn from(err: AppError) -> Self {
        let (code, message) = match &err {
            AppError::RoomFull(room_id) => {
                (ErrorCode::RoomFull, format!("Room '{}' is full", room_id))
            }
            AppError::RoomNotFound(room_id) => {
                (ErrorCode::RoomNotFound, format!("Room '{}' not found", room_id))
            }
            AppError::IdleTimeout => {
                (ErrorCode::IdleTimeout, "Connection idle for too long".to_string())
            }
            // Transport errors are not meant for the client
            _ => (ErrorCode::Internal, "Internal error".to_string()),
        };
        ServerNotice::Error { code, message }
    }
}
