//! Test doubles for the `Connection` capability

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::connection::Connection;
use crate::error::{AppError, SendError};
use crate::message::Payload;
use crate::types::ConnectionId;

/// In-memory connection
///
/// Records every payload sent to it. Inbound payloads are scripted through
/// the paired `MockPeer`; dropping the peer disconnects the connection.
pub struct MockConnection {
    id: ConnectionId,
    sent: std::sync::Mutex<Vec<Payload>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Payload>>,
    fail_sends: AtomicBool,
    closed: AtomicUsize,
}

/// Remote end of a `MockConnection`
pub struct MockPeer {
    tx: mpsc::UnboundedSender<Payload>,
}

impl MockPeer {
    /// Make the connection receive `payload`
    pub fn say(&self, payload: impl Into<Payload>) {
        let _ = self.tx.send(payload.into());
    }
}

impl MockConnection {
    pub fn new() -> (Arc<Self>, MockPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            sent: std::sync::Mutex::new(Vec::new()),
            inbound: Mutex::new(rx),
            fail_sends: AtomicBool::new(false),
            closed: AtomicUsize::new(0),
        });
        (conn, MockPeer { tx })
    }

    /// A connection whose every send fails
    pub fn failing() -> (Arc<Self>, MockPeer) {
        let (conn, peer) = Self::new();
        conn.fail_sends.store(true, Ordering::SeqCst);
        (conn, peer)
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SendError::Rejected("mock send failure".to_string()));
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn receive(&self) -> Result<Payload, AppError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(AppError::Disconnected)
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
