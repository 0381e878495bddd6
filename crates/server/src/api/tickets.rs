//! Queue and lifecycle API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use conductor_core::{
    CompletionCheck, PublishOutcome, QueueState, SessionRef, Ticket, TriggerType,
};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for adding a ticket by hand
#[derive(Debug, Deserialize)]
pub struct AddTicketBody {
    /// Readable id; generated when absent
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Tracker issue id, needed to publish results later
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub project_id: String,
    pub priority: Option<String>,
}

/// Request body for manual completion
#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    pub summary: String,
}

/// Request body for publishing results
#[derive(Debug, Default, Deserialize)]
pub struct PublishBody {
    /// Overrides the summary recorded at completion
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketsResponse {
    pub tickets: Vec<Ticket>,
    pub count: usize,
}

impl From<Vec<Ticket>> for TicketsResponse {
    fn from(tickets: Vec<Ticket>) -> Self {
        Self {
            count: tickets.len(),
            tickets,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ticket_id: String,
    pub removed_from: QueueState,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub ticket_id: String,
    #[serde(flatten)]
    pub outcome: PublishOutcome,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_pending(State(state): State<Arc<AppState>>) -> Json<TicketsResponse> {
    Json(state.engine().list_pending().into())
}

pub async fn list_active(State(state): State<Arc<AppState>>) -> Json<TicketsResponse> {
    Json(state.engine().list_active().into())
}

pub async fn list_completed(State(state): State<Arc<AppState>>) -> Json<TicketsResponse> {
    Json(state.engine().list_completed().into())
}

/// Add a ticket to the pending queue by hand
pub async fn add_pending(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddTicketBody>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let id = body.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let ticket = Ticket {
        title: body.title,
        description: body.description,
        uuid: body.uuid,
        project_id: body.project_id,
        priority: body.priority,
        ..Ticket::new(id.clone(), TriggerType::Manual)
    };

    state.engine().add_pending(ticket.clone())?;
    info!("Ticket {} added to pending queue via API", id);

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Approve a pending ticket and start its session
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionRef>, ApiError> {
    let session = state.engine().approve(&id).await?;
    Ok(Json(session))
}

/// Mark an active ticket as completed with a hand-written summary
pub async fn mark_completed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state.engine().mark_completed(&id, &body.summary)?;
    Ok(Json(ticket))
}

/// Check the completion artifact of a single ticket
pub async fn check_completion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CompletionCheck>, ApiError> {
    let check = state
        .watcher()
        .check_completion(state.engine(), &id)
        .await?;
    Ok(Json(check))
}

/// Publish a completed ticket's summary to the tracker
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PublishBody>,
) -> Result<Json<PublishResponse>, ApiError> {
    let outcome = state
        .engine()
        .publish(&id, body.summary.as_deref())
        .await?;
    Ok(Json(PublishResponse {
        ticket_id: id,
        outcome,
    }))
}

/// Remove a pending or completed ticket
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let removed_from = state.engine().delete(&id)?;
    Ok(Json(DeleteResponse {
        ticket_id: id,
        removed_from,
    }))
}
