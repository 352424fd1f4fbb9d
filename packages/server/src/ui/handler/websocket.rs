//! WebSocket upgrade handler.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::StreamExt;

use crate::ui::{session::ClientSession, state::AppState};

/// Accept a WebSocket connection and run a `ClientSession` on it.
///
/// The session id is assigned here, before the upgrade completes.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let session = ClientSession::new(
        state.registry.clone(),
        state.handler.clone(),
        &state.session_config,
        Some(remote_addr),
        &state.shutdown,
    );
    tracing::info!(
        "Connection opened: session {} from {}",
        session.id(),
        remote_addr
    );

    ws.on_upgrade(move |socket| async move {
        let (sender, receiver) = socket.split();
        session.run(receiver, sender).await;
    })
}
