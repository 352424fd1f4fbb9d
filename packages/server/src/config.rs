//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Routes served by the HTTP layer itself; the WebSocket path must avoid them.
const RESERVED_PATHS: [&str; 2] = ["/api/health", "/api/sessions"];

/// Configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`)
    pub host: String,
    /// Port to bind (default `8080`)
    pub port: u16,
    /// Path the WebSocket endpoint is mounted at (default `"/server"`)
    pub ws_path: String,
    /// Directory served at `/` for the bundled web client (default `"webroot"`)
    pub static_dir: String,
    /// Capacity of each session's outbound queue
    pub outbound_capacity: usize,
    /// Capacity of each session's inbound queue
    pub inbound_capacity: usize,
    /// How long a broadcast waits for a full outbound queue, in milliseconds.
    /// `0` waits until the recipient disconnects.
    pub send_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            ws_path: "/server".into(),
            static_dir: "webroot".into(),
            outbound_capacity: 64,
            inbound_capacity: 64,
            send_timeout_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Check the values that cannot be enforced by their types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_static_route(&self.ws_path) {
            return Err(ConfigError::InvalidPath(self.ws_path.clone()));
        }
        if RESERVED_PATHS.contains(&self.ws_path.as_str()) {
            return Err(ConfigError::ReservedPath(self.ws_path.clone()));
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "outbound_capacity",
            });
        }
        if self.inbound_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "inbound_capacity",
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            outbound_capacity: self.outbound_capacity,
            inbound_capacity: self.inbound_capacity,
            send_timeout: (self.send_timeout_ms > 0)
                .then(|| Duration::from_millis(self.send_timeout_ms)),
        }
    }
}

/// Whether `path` is an absolute route made only of literal, non-empty segments.
///
/// Captures (`{id}`), wildcards (`*`) and `:`-prefixed segments are router
/// syntax, and `/` alone would shadow the static web client.
fn is_static_route(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/').all(|segment| {
        !segment.is_empty()
            && !segment.starts_with(':')
            && !segment.contains(['{', '}', '*'])
    })
}

/// Settings every `ClientSession` is created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub outbound_capacity: usize,
    pub inbound_capacity: usize,
    pub send_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        ServerConfig::default().session_config()
    }
}
