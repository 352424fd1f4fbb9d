//! Domain layer: session identity, lifecycle and the message-routing seam.
//!
//! Nothing here touches sockets. The socket-facing side lives in `ui`, the
//! membership actor in `infrastructure`.

mod error;
mod handler;
mod session;

pub use error::{RegistryError, SessionError};
pub use handler::MessageHandler;
#[cfg(test)]
pub use handler::MockMessageHandler;
pub use session::{SessionHandle, SessionId, SessionInfo, SessionLifecycle, SessionState};
#[cfg(test)]
pub(crate) use session::test_support;
