//! Server state shared by the HTTP handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{config::SessionConfig, domain::MessageHandler, infrastructure::RegistryHandle};

/// Shared application state
pub struct AppState {
    /// Registry（接続中セッションの管理）
    pub registry: RegistryHandle,
    /// Routing policy every new session dispatches to
    pub handler: Arc<dyn MessageHandler>,
    /// Settings for new sessions
    pub session_config: SessionConfig,
    /// Server-wide shutdown; parent of every session's token
    pub shutdown: CancellationToken,
}
