//! Client side of the registry control loop.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::{mpsc, oneshot};

use crate::domain::{RegistryError, SessionError, SessionHandle, SessionId, SessionInfo};

use super::command::RegistryCommand;

/// Handle to a running [`ConnectionRegistry`](super::ConnectionRegistry).
///
/// Cheap to clone. Requests wait for the control loop's reply; when the loop
/// has stopped they fail with [`RegistryError::Closed`].
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    commands: mpsc::Sender<RegistryCommand>,
    errors: mpsc::UnboundedSender<SessionError>,
    next_id: Arc<AtomicU64>,
}

impl RegistryHandle {
    pub(super) fn new(
        commands: mpsc::Sender<RegistryCommand>,
        errors: mpsc::UnboundedSender<SessionError>,
    ) -> Self {
        Self {
            commands,
            errors,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Allocate the next session id.
    ///
    /// Ids start at 0 and are strictly increasing in call order across all
    /// clones of this handle. They are never reused.
    pub fn next_session_id(&self) -> SessionId {
        SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Hand a new session to the control loop and wait until it is recorded.
    ///
    /// Returns `Ok(false)` when a session with the same id is already registered.
    pub async fn register(&self, session: SessionHandle) -> Result<bool, RegistryError> {
        self.request(|ack| RegistryCommand::Register { session, ack }).await
    }

    /// Remove a session and wait until the removal is processed.
    ///
    /// Removing an id that is not registered is a no-op and returns `Ok(false)`.
    pub async fn deregister(&self, id: SessionId) -> Result<bool, RegistryError> {
        self.request(|ack| RegistryCommand::Deregister { id, ack }).await
    }

    /// All registered sessions, ordered by id.
    pub async fn snapshot(&self) -> Result<Vec<SessionHandle>, RegistryError> {
        self.request(|reply| RegistryCommand::Snapshot { reply }).await
    }

    /// Metadata of all registered sessions, ordered by id.
    pub async fn members(&self) -> Result<Vec<SessionInfo>, RegistryError> {
        self.request(|reply| RegistryCommand::Members { reply }).await
    }

    /// Send an error to the centralized error sink.
    ///
    /// Never waits. If the control loop is gone the error is logged here instead.
    pub fn report_error(&self, error: SessionError) {
        if let Err(mpsc::error::SendError(error)) = self.errors.send(error) {
            tracing::warn!("Registry stopped, error not delivered: {}", error);
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| RegistryError::Closed)?;
        rx.await.map_err(|_| RegistryError::Closed)
    }
}
