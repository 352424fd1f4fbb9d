//! Session identity, lifecycle state and the registry-facing session handle.

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::SessionError;

/// Identifier of a session, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Connection metadata recorded when a session is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    /// Peer address, when the listener exposes it
    pub remote_addr: Option<SocketAddr>,
    /// Unix timestamp in JST (milliseconds)
    pub connected_at: i64,
}

/// Lifecycle of a session.
///
/// ```text
/// Connected -> Disconnecting -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// All three loops are running
    Connected,
    /// Loops are being cancelled and joined
    Disconnecting,
    /// Socket closed and session removed from the registry
    Closed,
}

/// Owner side of a session's lifecycle state.
///
/// Only the transition out of `Connected` can start a disconnect, which makes
/// the disconnect sequence run at most once however many times it is asked for.
#[derive(Debug)]
pub struct SessionLifecycle {
    state: watch::Sender<SessionState>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Connected);
        Self { state }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Move `Connected` to `Disconnecting`.
    ///
    /// Returns `false` when a disconnect has already started.
    pub fn begin_disconnect(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Connected {
                *state = SessionState::Disconnecting;
                true
            } else {
                false
            }
        })
    }

    /// Mark the session `Closed`. This is the done signal.
    pub fn finish(&self) {
        self.state.send_replace(SessionState::Closed);
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Clonable view of a live session, held by the registry and the routing policy.
///
/// Carries the outbound queue sender and the session's cancellation token.
/// It never gives access to the socket.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    info: Arc<SessionInfo>,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
    send_timeout: Option<Duration>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn new(
        info: SessionInfo,
        outbound: mpsc::Sender<String>,
        cancel: CancellationToken,
        send_timeout: Option<Duration>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            info: Arc::new(info),
            outbound,
            cancel,
            send_timeout,
            state,
        }
    }

    pub fn id(&self) -> SessionId {
        self.info.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Enqueue `message` on the outbound queue.
    ///
    /// Waits while the queue is full, until either the send deadline passes or
    /// the session is cancelled.
    pub async fn send(&self, message: String) -> Result<(), SessionError> {
        let id = self.id();
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed(id));
        }

        let enqueue = async {
            match self.send_timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, self.outbound.send(message)).await {
                        Ok(result) => result.map_err(|_| SessionError::Closed(id)),
                        Err(_) => Err(SessionError::SendTimeout { id, timeout }),
                    }
                }
                None => self
                    .outbound
                    .send(message)
                    .await
                    .map_err(|_| SessionError::Closed(id)),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Closed(id)),
            result = enqueue => result,
        }
    }

    /// Request termination of all of the session's loops.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Token cancelled together with this session, but cancellable on its own.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Resolves once the session has reached `Closed`, or its owner is gone.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a handle with its outbound receiver and lifecycle, for tests.
    pub fn handle(
        id: u64,
        capacity: usize,
        send_timeout: Option<Duration>,
    ) -> (SessionHandle, mpsc::Receiver<String>, SessionLifecycle) {
        let (tx, rx) = mpsc::channel(capacity);
        let lifecycle = SessionLifecycle::new();
        let info = SessionInfo {
            id: SessionId::new(id),
            remote_addr: None,
            connected_at: 0,
        };
        let handle = SessionHandle::new(
            info,
            tx,
            CancellationToken::new(),
            send_timeout,
            lifecycle.subscribe(),
        );
        (handle, rx, lifecycle)
    }
}
