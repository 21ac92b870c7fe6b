//! Room Relay - Entry Point
//!
//! Loads configuration, binds the TCP listener and accepts connections
//! until interrupted.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use room_relay::{handle_connection, RoomDirectory, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room_relay=info")),
        )
        .init();

    // Address from command line or RELAY_ADDR, the rest from RELAY_* vars
    let config = Arc::new(ServerConfig::from_env()?);

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("Room relay listening on ws://{}/ws", config.addr);
    if let Some(limit) = config.idle_timeout {
        info!("Idle members are closed after {:?}", limit);
    }

    let directory = Arc::new(RoomDirectory::new());

    // Connection accept loop
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let directory = directory.clone();
                    let config = config.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, directory, config).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
        }
    }

    info!("Open rooms at shutdown: {}", directory.room_count().await);
    Ok(())
}
