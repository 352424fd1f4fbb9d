//! Server execution logic.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    config::ServerConfig, domain::MessageHandler, error::ServerError,
    infrastructure::ConnectionRegistry, usecase::BroadcastHandler,
};

use super::{
    handler::{health_check, list_sessions, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Relay server
///
/// Owns the configuration; the registry, routing policy and listener are
/// created when the server starts.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(ServerConfig::default())?;
/// server.run().await?;
/// ```
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a server after validating `config`.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind to the configured address and serve until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the listener cannot be bound, or
    /// `ServerError::Io` if serving fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let bind_addr = self.config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;

        tracing::info!("Press Ctrl+C to shutdown gracefully");
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// On shutdown every session is cancelled and the registry is stopped
    /// before this returns.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown_token = CancellationToken::new();
        let (registry, registry_task) = ConnectionRegistry::spawn(shutdown_token.clone());
        let handler: Arc<dyn MessageHandler> = Arc::new(BroadcastHandler::new(registry.clone()));

        let app_state = Arc::new(AppState {
            registry,
            handler,
            session_config: self.config.session_config(),
            shutdown: shutdown_token.clone(),
        });
        let app = build_router(&self.config, app_state);

        let local_addr = listener.local_addr()?;
        tracing::info!("Relay server listening on {}", local_addr);
        tracing::info!("Connect to: ws://{}{}", local_addr, self.config.ws_path);

        let token = shutdown_token.clone();
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            token.cancel();
        })
        .await;

        shutdown_token.cancel();
        if let Err(e) = registry_task.await {
            tracing::warn!("Registry task failed: {}", e);
        }
        result?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Build the router: WebSocket endpoint, diagnostics API and static assets.
pub fn build_router(config: &ServerConfig, state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route(&config.ws_path, get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/sessions", get(list_sessions))
        // 静的ファイル（Web クライアント）
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
