//! Per-connection lifecycle
//!
//! Admit → relay every received payload to the room → leave on disconnect.
//! Works against the `Connection` trait only, so the WebSocket handler and
//! the tests drive the same code.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::directory::RoomDirectory;
use crate::error::AppError;
use crate::message::ServerNotice;
use crate::room::Room;
use crate::types::RoomId;

/// Per-connection behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Close a member that sends nothing for this long; None waits forever
    ///
    /// Only frames received from the member count as activity. A member
    /// that only listens is closed even while its room is busy.
    pub idle_timeout: Option<Duration>,
    /// Relay a message back to its sender as well
    pub echo: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            echo: true,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Room was full; the connection never joined
    Rejected,
    /// Peer went away
    Disconnected,
    /// Peer stayed silent past the idle timeout
    IdleTimeout,
}

/// Drive one connection from admission to cleanup
///
/// Errors never leak to other connections: a full room is reported to the
/// client and ends the session with `SessionEnd::Rejected`.
pub async fn run(
    directory: &RoomDirectory,
    room_id: &RoomId,
    conn: Arc<dyn Connection>,
    options: &SessionOptions,
) -> Result<SessionEnd, AppError> {
    let conn_id = conn.id();

    let room = match directory.admit(room_id, conn.clone()).await {
        Ok(room) => room,
        Err(err @ AppError::RoomFull(_)) => {
            info!("Connection {} rejected: {}", conn_id, err);
            notify(conn.as_ref(), err).await;
            conn.close().await;
            return Ok(SessionEnd::Rejected);
        }
        Err(e) => {
            conn.close().await;
            return Err(e);
        }
    };

    info!("Connection {} joined room {}", conn_id, room_id);

    let end = relay(&room, conn.as_ref(), options).await;

    room.leave(conn_id).await;
    directory.remove_if_empty(room_id).await;

    if end == SessionEnd::IdleTimeout {
        notify(conn.as_ref(), AppError::IdleTimeout).await;
    }
    conn.close().await;

    info!("Connection {} left room {} ({:?})", conn_id, room_id, end);
    Ok(end)
}

/// Receive loop; returns once the connection stops producing payloads
async fn relay(room: &Room, conn: &dyn Connection, options: &SessionOptions) -> SessionEnd {
    let conn_id = conn.id();

    loop {
        let received = match options.idle_timeout {
            Some(limit) => match timeout(limit, conn.receive()).await {
                Ok(received) => received,
                Err(_) => {
                    info!("Connection {} idle for {:?}", conn_id, limit);
                    return SessionEnd::IdleTimeout;
                }
            },
            None => conn.receive().await,
        };

        let payload = match received {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Receive ended for {}: {}", conn_id, e);
                return SessionEnd::Disconnected;
            }
        };

        debug!(
            "Relaying {} bytes from {} in room {}",
            payload.len(),
            conn_id,
            room.id()
        );

        let delivered = if options.echo {
            room.broadcast(payload).await
        } else {
            room.broadcast_except(conn_id, payload).await
        };

        if let Err(failures) = delivered {
            for failure in failures {
                warn!("Room {}: {}", room.id(), failure);
            }
        }
    }
}

/// Best-effort notice to a client that is about to be closed
async fn notify(conn: &dyn Connection, err: AppError) {
    match ServerNotice::from(err).to_payload() {
        Ok(payload) => {
            if let Err(e) = conn.send(payload).await {
                debug!("Could not notify {}: {}", conn.id(), e);
            }
        }
        Err(e) => error!("Failed to serialize notice: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Payload;
    use crate::testing::MockConnection;

    async fn eventually<F: Fn() -> bool>(check: F) {
        timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    async fn member_count(directory: &RoomDirectory, id: &RoomId) -> usize {
        match directory.get(id).await {
            Ok(room) => room.len().await,
            Err(_) => 0,
        }
    }

    async fn wait_for_members(directory: &RoomDirectory, id: &RoomId, expected: usize) {
        timeout(Duration::from_secs(2), async {
            while member_count(directory, id).await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("room never reached the expected size");
    }

    fn spawn_session(
        directory: &Arc<RoomDirectory>,
        id: &RoomId,
        conn: Arc<MockConnection>,
        options: SessionOptions,
    ) -> tokio::task::JoinHandle<Result<SessionEnd, AppError>> {
        let directory = directory.clone();
        let id = id.clone();
        tokio::spawn(async move { run(&directory, &id, conn, &options).await })
    }

    #[tokio::test]
    async fn test_two_peers_relay_and_third_is_rejected() {
        let directory = Arc::new(RoomDirectory::new());
        let id = RoomId::from("r1");
        let options = SessionOptions::default();

        let (a, peer_a) = MockConnection::new();
        let (b, _peer_b) = MockConnection::new();
        let (c, _peer_c) = MockConnection::new();

        let session_a = spawn_session(&directory, &id, a.clone(), options);
        wait_for_members(&directory, &id, 1).await;
        let session_b = spawn_session(&directory, &id, b.clone(), options);
        wait_for_members(&directory, &id, 2).await;

        let end_c = run(&directory, &id, c.clone(), &options).await.unwrap();
        assert_eq!(end_c, SessionEnd::Rejected);
        assert_eq!(c.close_count(), 1);
        let notice = c.sent();
        assert_eq!(notice.len(), 1);
        assert!(matches!(&notice[0], Payload::Text(json) if json.contains("room_full")));

        peer_a.say("hello");
        eventually(|| b.sent() == vec![Payload::from("hello")]).await;
        // Echo is on by default
        eventually(|| a.sent() == vec![Payload::from("hello")]).await;

        drop(peer_a);
        assert_eq!(session_a.await.unwrap().unwrap(), SessionEnd::Disconnected);

        let room = directory.get(&id).await.unwrap();
        assert_eq!(room.member_ids().await, vec![b.id()]);

        // The freed slot admits a new joiner
        let (d, _peer_d) = MockConnection::new();
        let session_d = spawn_session(&directory, &id, d.clone(), options);
        wait_for_members(&directory, &id, 2).await;

        session_b.abort();
        session_d.abort();
    }

    #[tokio::test]
    async fn test_without_echo_sender_gets_nothing_back() {
        let directory = Arc::new(RoomDirectory::new());
        let id = RoomId::from("quiet");
        let options = SessionOptions {
            echo: false,
            ..SessionOptions::default()
        };

        let (a, peer_a) = MockConnection::new();
        let (b, _peer_b) = MockConnection::new();
        let _session_a = spawn_session(&directory, &id, a.clone(), options);
        let _session_b = spawn_session(&directory, &id, b.clone(), options);
        wait_for_members(&directory, &id, 2).await;

        peer_a.say("ping");
        eventually(|| b.sent().len() == 1).await;

        assert_eq!(b.sent(), vec![Payload::from("ping")]);
        assert!(a.sent().is_empty());
    }

    #[tokio::test]
    async fn test_messages_from_one_sender_keep_order() {
        let directory = Arc::new(RoomDirectory::new());
        let id = RoomId::from("ordered");
        let options = SessionOptions::default();

        let (a, peer_a) = MockConnection::new();
        let (b, _peer_b) = MockConnection::new();
        let _session_a = spawn_session(&directory, &id, a.clone(), options);
        let _session_b = spawn_session(&directory, &id, b.clone(), options);
        wait_for_members(&directory, &id, 2).await;

        for i in 0..20 {
            peer_a.say(i.to_string().as_str());
        }
        eventually(|| b.sent().len() == 20).await;

        let expected: Vec<Payload> = (0..20).map(|i| Payload::Text(i.to_string())).collect();
        assert_eq!(b.sent(), expected);
    }

    #[tokio::test]
    async fn test_failing_member_does_not_end_sender_session() {
        let directory = Arc::new(RoomDirectory::new());
        let id = RoomId::from("flaky");
        let options = SessionOptions::default();

        let (a, peer_a) = MockConnection::new();
        let (b, _peer_b) = MockConnection::failing();
        let session_a = spawn_session(&directory, &id, a.clone(), options);
        let _session_b = spawn_session(&directory, &id, b.clone(), options);
        wait_for_members(&directory, &id, 2).await;

        peer_a.say("one");
        peer_a.say("two");
        eventually(|| a.sent().len() == 2).await;

        assert!(!session_a.is_finished());
        assert_eq!(member_count(&directory, &id).await, 2);
    }

    #[tokio::test]
    async fn test_last_member_leaving_removes_room() {
        let directory = Arc::new(RoomDirectory::new());
        let id = RoomId::from("short-lived");
        let options = SessionOptions::default();

        let (a, peer_a) = MockConnection::new();
        let session_a = spawn_session(&directory, &id, a.clone(), options);
        wait_for_members(&directory, &id, 1).await;

        drop(peer_a);
        assert_eq!(session_a.await.unwrap().unwrap(), SessionEnd::Disconnected);

        assert_eq!(directory.room_count().await, 0);
        assert_eq!(a.close_count(), 1);
    }

    #[tokio::test]
    async fn test_idle_member_is_closed() {
        let directory = Arc::new(RoomDirectory::new());
        let id = RoomId::from("sleepy");
        let options = SessionOptions {
            idle_timeout: Some(Duration::from_millis(50)),
            ..SessionOptions::default()
        };

        let (a, _peer_a) = MockConnection::new();
        let end = run(&directory, &id, a.clone(), &options).await.unwrap();

        assert_eq!(end, SessionEnd::IdleTimeout);
        assert_eq!(directory.room_count().await, 0);
        assert_eq!(a.close_count(), 1);
        assert!(matches!(&a.sent()[0], Payload::Text(json) if json.contains("idle_timeout")));
    }
}
