//! Domain layer error definitions.

use std::time::Duration;

use thiserror::Error;

use super::SessionId;

/// Errors raised by a session's loops.
///
/// All of them end up at the registry's error sink; none is sent to a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Receiving a frame from the socket failed
    #[error("session {id}: read failed: {reason}")]
    Read { id: SessionId, reason: String },

    /// Sending a frame on the socket failed
    #[error("session {id}: write failed: {reason}")]
    Write { id: SessionId, reason: String },

    /// Closing the socket failed
    #[error("session {id}: close failed: {reason}")]
    Close { id: SessionId, reason: String },

    /// The outbound queue stayed full past the send deadline
    #[error("session {id}: outbound queue did not accept a message within {timeout:?}")]
    SendTimeout { id: SessionId, timeout: Duration },

    /// The session has been cancelled and accepts no more messages
    #[error("session {0} is closed")]
    Closed(SessionId),
}

/// Errors returned by `RegistryHandle` requests.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The control loop has stopped
    #[error("connection registry is no longer running")]
    Closed,
}
