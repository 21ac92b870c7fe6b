//! Room directory
//!
//! Maps room ids to rooms. The directory lock covers only the map itself;
//! membership changes take the room's own lock. When both are needed the
//! order is always directory first, then room.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::AppError;
use crate::message::Payload;
use crate::room::Room;
use crate::types::RoomId;

/// Registry of live rooms
///
/// Construct one per server and share it through an `Arc`.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    /// All active rooms: RoomId -> Room
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room for `id`, creating and registering it if needed
    ///
    /// Concurrent callers for the same unseen id all get the same room.
    pub async fn get_or_create(&self, id: &RoomId) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(id) {
            return room.clone();
        }

        let room = Arc::new(Room::new(id.clone()));
        rooms.insert(id.clone(), room.clone());
        info!("Room {} created", id);
        debug!("Total rooms: {}", rooms.len());
        room
    }

    /// Look up an existing room without creating it
    pub async fn get(&self, id: &RoomId) -> Result<Arc<Room>, AppError> {
        self.rooms
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::RoomNotFound(id.clone()))
    }

    /// Resolve `id` and admit `conn` into it
    ///
    /// If the resolved room gets retired before the join lands, a fresh
    /// room is resolved and the join retried.
    pub async fn admit(
        &self,
        id: &RoomId,
        conn: Arc<dyn Connection>,
    ) -> Result<Arc<Room>, AppError> {
        loop {
            let room = self.get_or_create(id).await;
            match room.join(conn.clone()).await {
                Ok(()) => return Ok(room),
                Err(AppError::RoomRetired(_)) => {
                    debug!("Room {} retired during admission, retrying", id);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drop the room for `id` if it has no members
    ///
    /// Returns true if a room was removed. A room is checked and retired
    /// under its own lock while the directory lock is held, so it cannot
    /// gain a member in between.
    pub async fn remove_if_empty(&self, id: &RoomId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(id).cloned() else {
            return false;
        };

        if !room.retire_if_empty().await {
            return false;
        }

        rooms.remove(id);
        info!(
            "Room {} deleted (empty, lived {:?})",
            id,
            room.created_at().elapsed()
        );
        debug!("Total rooms: {}", rooms.len());
        true
    }

    /// Relay `payload` to every member of an existing room
    pub async fn broadcast(&self, id: &RoomId, payload: Payload) -> Result<(), AppError> {
        let room = self.get(id).await?;
        room.broadcast(payload).await.map_err(AppError::Delivery)
    }

    /// Number of registered rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
