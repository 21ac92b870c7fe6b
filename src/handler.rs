//! WebSocket connection handler
//!
//! Handles individual TCP connections: WebSocket handshake, room selection
//! from the request URI, then hands the connection to a session.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::client::Client;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::directory::RoomDirectory;
use crate::error::AppError;
use crate::session;
use crate::types::RoomId;

/// Path clients connect to
pub const WS_PATH: &str = "/ws";

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, resolves the room from the `room`
/// query parameter and runs the connection's session to completion.
/// A failed handshake is logged and is not an error.
pub async fn handle_connection(
    stream: TcpStream,
    directory: Arc<RoomDirectory>,
    config: Arc<ServerConfig>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, capturing the requested room
    let mut requested_room = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let path = req.uri().path();
        if path != WS_PATH {
            let mut not_found = ErrorResponse::new(Some(format!("No endpoint at {}", path)));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            return Err(not_found);
        }
        requested_room = Some(room_from_query(req.uri().query()));
        Ok(resp)
    };
    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            // Stray HTTP requests and broken handshakes end here
            warn!("Handshake with {} rejected: {}", peer_addr, e);
            return Ok(());
        }
    };
    let room_id = requested_room.unwrap_or_default();

    let client = Arc::new(Client::new(ws_stream, config.outbound_buffer));
    info!(
        "Client {} connected from {} for room {}",
        client.id(),
        peer_addr,
        room_id
    );

    session::run(&directory, &room_id, client, &config.session_options()).await?;

    Ok(())
}

/// Pick the room from a request query string
///
/// The first `room` parameter wins; a missing or empty value selects
/// `RoomId::DEFAULT`.
pub fn room_from_query(query: Option<&str>) -> RoomId {
    query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "room")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|room| !room.is_empty())
        .map(RoomId::new)
        .unwrap_or_default()
}
