//! Error types for the relay client.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket handshake could not be completed
    #[error("Connection error: {0}")]
    ConnectionError(#[from] tungstenite::Error),

    /// An established connection was closed or broke
    #[error("Connection lost: {0}")]
    Disconnected(String),

    /// Every reconnection attempt failed
    #[error("Failed to reconnect after {attempts} attempts")]
    ReconnectFailed { attempts: u32 },
}
