//! Message-routing policy trait.

use async_trait::async_trait;

use super::SessionHandle;

/// Decides what happens to a message received from one session.
///
/// The dispatch loop of the sending session awaits `on_message`, so a slow
/// implementation delays that session's next message and nobody else's.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Route `message`, received from `sender`.
    async fn on_message(&self, sender: &SessionHandle, message: &str);
}
