//! HTTP handlers for diagnostics.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use hibiki_shared::time::timestamp_to_jst_rfc3339;

use crate::{domain::SessionInfo, ui::state::AppState};

/// Session entry returned by `GET /api/sessions`
#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub id: u64,
    pub remote_addr: Option<String>,
    pub connected_at: Option<String>,
}

/// Response body of `GET /api/sessions`
#[derive(Debug, Serialize)]
pub struct SessionListDto {
    pub count: usize,
    pub sessions: Vec<SessionDto>,
}

impl From<SessionInfo> for SessionDto {
    fn from(info: SessionInfo) -> Self {
        Self {
            id: info.id.value(),
            remote_addr: info.remote_addr.map(|addr| addr.to_string()),
            connected_at: timestamp_to_jst_rfc3339(info.connected_at),
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Currently registered sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionListDto>, StatusCode> {
    let members = state.registry.members().await.map_err(|e| {
        tracing::warn!("Failed to list sessions: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let sessions: Vec<SessionDto> = members.into_iter().map(SessionDto::from).collect();
    Ok(Json(SessionListDto {
        count: sessions.len(),
        sessions,
    }))
}
