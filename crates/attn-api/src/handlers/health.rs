//! Health check handler.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub accepting_frames: bool,
    pub workers: usize,
    pub pending_frames: usize,
    pub rooms: usize,
    pub subscribers: usize,
    /// None when no persister is configured
    pub persisting: Option<bool>,
}

/// Liveness check with a snapshot of pipeline load.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let accepting_frames = state.pool.is_accepting();

    Json(HealthResponse {
        status: if accepting_frames { "healthy" } else { "draining" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        accepting_frames,
        workers: state.pool.workers(),
        pending_frames: state.pool.pending_frames(),
        rooms: state.hub.room_count(),
        subscribers: state.hub.total_subscribers(),
        persisting: state
            .persister
            .as_ref()
            .map(|persister| persister.ensure_running().is_ok()),
    })
}
