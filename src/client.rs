//! WebSocket-backed connection
//!
//! Splits a WebSocket stream into a reader owned by the session and a
//! writer task fed through an mpsc channel, so any task can send to the
//! client without touching the socket. Sending never waits: a client whose
//! queue is full is reported as a failed recipient.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{AppError, SendError};
use crate::message::Payload;
use crate::types::ConnectionId;

/// Longest a single socket write may take before the writer gives up
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connected WebSocket client
pub struct Client<S = TcpStream> {
    /// Unique identifier for this client
    id: ConnectionId,
    /// Server → Client message channel, drained by the writer task
    outbound: mpsc::Sender<Message>,
    /// Client → Server frames
    inbound: Mutex<SplitStream<WebSocketStream<S>>>,
    /// Writer task, aborted when a close frame cannot be queued
    writer: JoinHandle<()>,
    /// Set once close has been requested
    closed: AtomicBool,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an established WebSocket stream
    ///
    /// Spawns the writer task; `buffer` bounds the number of queued
    /// outbound messages.
    pub fn new(ws_stream: WebSocketStream<S>, buffer: usize) -> Self {
        let id = ConnectionId::new();
        let (mut ws_sender, ws_receiver) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(buffer);

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let is_close = msg.is_close();
                match timeout(WRITE_TIMEOUT, ws_sender.send(msg)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("WebSocket send failed for {}: {}", id, e);
                        break;
                    }
                    Err(_) => {
                        debug!("WebSocket write to {} timed out", id);
                        break;
                    }
                }
                if is_close {
                    break;
                }
            }
            debug!("Write task ended for {}", id);

            let _ = timeout(WRITE_TIMEOUT, ws_sender.close()).await;
        });

        Self {
            id,
            outbound,
            inbound: Mutex::new(ws_receiver),
            writer,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<S> Connection for Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::ChannelClosed);
        }
        self.outbound
            .try_send(payload.into_message())
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Full,
                TrySendError::Closed(_) => SendError::ChannelClosed,
            })
    }

    async fn receive(&self) -> Result<Payload, AppError> {
        let mut inbound = self.inbound.lock().await;

        loop {
            match inbound.next().await {
                Some(Ok(Message::Close(_))) => {
                    debug!("Client {} sent close frame", self.id);
                    return Err(AppError::Disconnected);
                }
                Some(Ok(msg)) => {
                    // Pongs are queued by tungstenite itself
                    if let Some(payload) = Payload::from_message(msg) {
                        return Ok(payload);
                    }
                }
                Some(Err(e)) => {
                    debug!("WebSocket error for {}: {}", self.id, e);
                    return Err(AppError::Disconnected);
                }
                None => return Err(AppError::Disconnected),
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(TrySendError::Full(_)) = self.outbound.try_send(Message::Close(None)) {
            // Peer is not draining its queue; drop the socket's write half
            debug!("Outbound queue full for {}, aborting writer", self.id);
            self.writer.abort();
        }
    }
}
