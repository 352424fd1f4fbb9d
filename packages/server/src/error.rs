//! Error types for server startup and execution.

use thiserror::Error;

/// Invalid server configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// WebSocket path must be an absolute, literal route
    #[error("WebSocket path must be an absolute literal path such as '/server' (got: '{0}')")]
    InvalidPath(String),

    /// WebSocket path collides with a built-in route
    #[error("WebSocket path '{0}' is reserved")]
    ReservedPath(String),

    /// Queue capacity must be at least one
    #[error("{name} must be greater than zero")]
    ZeroCapacity { name: &'static str },
}

/// Server-level errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration rejected at startup
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Binding the listener failed
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while serving
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
