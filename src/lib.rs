//! Room Relay Library
//!
//! A minimal WebSocket relay built with tokio-tungstenite. Clients connect
//! to `/ws?room=<id>`; whatever one member of a room sends is relayed
//! verbatim to the room's members.
//!
//! # Features
//! - Rooms created on first use, removed when the last member leaves
//! - At most two members per room; extra joiners are refused and closed
//! - Best-effort fan-out: one failing member never blocks the other
//! - Optional idle timeout and sender echo
//!
//! # Architecture
//! - `RoomDirectory` maps room ids to rooms behind one short-held lock
//! - Each `Room` guards its own membership, so rooms never contend
//! - Each connection runs its own `session` task: admit, relay, leave
//! - Sessions only see the `Connection` trait; `Client` implements it
//!   over a WebSocket stream
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use room_relay::{handle_connection, RoomDirectory, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8181").await.unwrap();
//!     let directory = Arc::new(RoomDirectory::new());
//!     let config = Arc::new(ServerConfig::default());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, directory.clone(), config.clone()));
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use client::Client;
pub use config::ServerConfig;
pub use connection::Connection;
pub use directory::RoomDirectory;
pub use error::{AppError, DeliveryFailure, SendError};
pub use handler::{handle_connection, room_from_query};
pub use message::{ErrorCode, Payload, ServerNotice};
pub use room::Room;
pub use session::{SessionEnd, SessionOptions};
pub use types::{ConnectionId, RoomId};
