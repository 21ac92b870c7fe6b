//! Error types for the relay
//!
//! Defines application-level errors, per-recipient send errors, and the
//! failure record collected during a broadcast.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::{ConnectionId, RoomId};

/// Application-level errors
///
/// Covers transport errors (connection termination), admission errors
/// (reported to the client, then the connection is closed) and
/// configuration errors (fatal at startup).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal for the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Lookup of a room that is not registered
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Room already has its maximum number of members
    #[error("Room {0} is full")]
    RoomFull(RoomId),

    /// Room was removed from the directory and admits no one
    #[error("Room {0} has been retired")]
    RoomRetired(RoomId),

    /// The peer closed the connection or the transport failed
    #[error("Disconnected")]
    Disconnected,

    /// No message arrived within the configured idle timeout
    #[error("Idle timeout")]
    IdleTimeout,

    /// One or more recipients of a broadcast could not be reached
    #[error("Delivery failed for {} recipient(s)", .0.len())]
    Delivery(Vec<DeliveryFailure>),
}

/// Message send errors
///
/// Occurs when a payload cannot be handed to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection's writer has gone away
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection's outbound queue is full; the peer is not reading
    #[error("Outbound queue full")]
    Full,

    /// The transport refused the payload
    #[error("Send rejected: {0}")]
    Rejected(String),
}

/// A single recipient that a broadcast failed to reach
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("send to {connection} failed: {source}")]
pub struct DeliveryFailure {
    pub connection: ConnectionId,
    pub source: SendError,
}
