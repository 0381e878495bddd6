use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use conductor_core::{SanitizedConfig, SessionInfo};

use super::error::ApiError;
use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` when the session service answers, `degraded` otherwise.
    pub status: String,
    pub session_service: bool,
    pub pending_count: usize,
    pub active_count: usize,
    pub completed_count: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let session_service = state.engine().sessions().health_check().await;
    let counts = state.engine().counts();

    Json(HealthResponse {
        status: if session_service { "healthy" } else { "degraded" }.to_string(),
        session_service,
        pending_count: counts.pending,
        active_count: counts.active,
        completed_count: counts.completed,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionInfo>,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state.engine().sessions().list_sessions().await?;
    Ok(Json(SessionsResponse { sessions }))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
