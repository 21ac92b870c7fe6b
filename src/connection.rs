//! Connection capability
//!
//! Rooms and sessions only ever talk to peers through this trait, so the
//! WebSocket-backed `Client` and the test doubles are interchangeable.

use async_trait::async_trait;

use crate::error::{AppError, SendError};
use crate::message::Payload;
use crate::types::ConnectionId;

/// A bidirectional message channel to one peer
#[async_trait]
pub trait Connection: Send + Sync {
    /// Identity of this connection
    fn id(&self) -> ConnectionId;

    /// Hand a payload to the peer
    ///
    /// May be called from any task, concurrently with `receive`.
    async fn send(&self, payload: Payload) -> Result<(), SendError>;

    /// Wait for the next payload from the peer
    ///
    /// Returns `AppError::Disconnected` once the peer is gone. Only the
    /// connection's own session calls this.
    async fn receive(&self) -> Result<Payload, AppError>;

    /// Close the connection. Calling it more than once is harmless.
    async fn close(&self);
}
