//! Room struct definition
//!
//! A room holds at most two connections and relays whatever one of them
//! sends to the members. Membership lives behind the room's own lock, so
//! traffic in one room never waits on another.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{AppError, DeliveryFailure};
use crate::message::Payload;
use crate::types::{ConnectionId, RoomId};

/// Relay room
///
/// Members are identified by `ConnectionId`. A room that the directory has
/// retired admits no one; its former id maps to a fresh room instead.
pub struct Room {
    /// Room identifier
    id: RoomId,
    /// Members and retirement flag
    state: Mutex<RoomState>,
    /// Room creation time
    created_at: Instant,
}

#[derive(Default)]
struct RoomState {
    members: Vec<Arc<dyn Connection>>,
    retired: bool,
}

impl Room {
    /// Maximum number of members
    pub const MAX_CAPACITY: usize = 2;

    /// Create a new empty room
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState::default()),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Admit a connection
    ///
    /// Fails with `RoomFull` when the room already has `MAX_CAPACITY`
    /// members and with `RoomRetired` once the directory dropped the room.
    /// Joining twice with the same connection is a no-op.
    pub async fn join(&self, conn: Arc<dyn Connection>) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        if state.retired {
            return Err(AppError::RoomRetired(self.id.clone()));
        }

        let conn_id = conn.id();
        if state.members.iter().any(|m| m.id() == conn_id) {
            return Ok(());
        }

        if state.members.len() >= Self::MAX_CAPACITY {
            return Err(AppError::RoomFull(self.id.clone()));
        }

        state.members.push(conn);
        debug!(
            "Connection {} joined room {} ({}/{})",
            conn_id,
            self.id,
            state.members.len(),
            Self::MAX_CAPACITY
        );
        Ok(())
    }

    /// Remove a connection
    ///
    /// Returns true if the connection was a member. Removing an absent
    /// connection does nothing.
    pub async fn leave(&self, conn_id: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.members.len();
        state.members.retain(|m| m.id() != conn_id);
        let removed = state.members.len() != before;

        if removed {
            debug!(
                "Connection {} left room {} ({}/{})",
                conn_id,
                self.id,
                state.members.len(),
                Self::MAX_CAPACITY
            );
        }
        removed
    }

    /// Send `payload` to every current member
    pub async fn broadcast(&self, payload: Payload) -> Result<(), Vec<DeliveryFailure>> {
        self.fan_out(None, payload).await
    }

    /// Send `payload` to every current member except `origin`
    pub async fn broadcast_except(
        &self,
        origin: ConnectionId,
        payload: Payload,
    ) -> Result<(), Vec<DeliveryFailure>> {
        self.fan_out(Some(origin), payload).await
    }

    /// Snapshot the members, release the lock, then send to all of them
    /// concurrently. Every recipient is attempted; failures are collected.
    async fn fan_out(
        &self,
        skip: Option<ConnectionId>,
        payload: Payload,
    ) -> Result<(), Vec<DeliveryFailure>> {
        let recipients: Vec<Arc<dyn Connection>> = {
            let state = self.state.lock().await;
            state
                .members
                .iter()
                .filter(|m| Some(m.id()) != skip)
                .cloned()
                .collect()
        };

        let results = join_all(recipients.iter().map(|member| {
            let payload = payload.clone();
            async move { (member.id(), member.send(payload).await) }
        }))
        .await;

        let failures: Vec<DeliveryFailure> = results
            .into_iter()
            .filter_map(|(connection, result)| {
                result
                    .err()
                    .map(|source| DeliveryFailure { connection, source })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    /// Mark the room retired if it has no members
    ///
    /// Called by the directory while it holds its own lock. Returns true if
    /// the room is now retired.
    pub(crate) async fn retire_if_empty(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.members.is_empty() {
            state.retired = true;
        }
        state.retired
    }

    /// Get the number of members in the room
    pub async fn len(&self) -> usize {
        self.state.lock().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Check if room is full (2 members)
    pub async fn is_full(&self) -> bool {
        self.len().await >= Self::MAX_CAPACITY
    }

    /// Check if a connection is a member of this room
    pub async fn contains(&self, conn_id: ConnectionId) -> bool {
        self.state
            .lock()
            .await
            .members
            .iter()
            .any(|m| m.id() == conn_id)
    }

    /// Member ids in join order
    pub async fn member_ids(&self) -> Vec<ConnectionId> {
        self.state
            .lock()
            .await
            .members
            .iter()
            .map(|m| m.id())
            .collect()
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
