//! Requests processed by the registry control loop.

use tokio::sync::oneshot;

use crate::domain::{SessionHandle, SessionId, SessionInfo};

pub(super) enum RegistryCommand {
    /// Add a session. Replies `false` when the id is already present.
    Register {
        session: SessionHandle,
        ack: oneshot::Sender<bool>,
    },
    /// Remove a session. Replies whether an entry was removed.
    Deregister {
        id: SessionId,
        ack: oneshot::Sender<bool>,
    },
    /// Current sessions, ordered by id.
    Snapshot {
        reply: oneshot::Sender<Vec<SessionHandle>>,
    },
    /// Current session metadata, ordered by id.
    Members {
        reply: oneshot::Sender<Vec<SessionInfo>>,
    },
}
