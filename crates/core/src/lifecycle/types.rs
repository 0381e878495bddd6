//! Types for the ticket lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionError;
use crate::tracker::TrackerError;

/// Why a ticket entered the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// First sighting of a ticket in a started/unstarted state.
    NewTicket,
    /// The tracker state id changed since the last poll.
    StatusChange,
    /// Same state, newer `updated_at` (usually a comment).
    CommentAdded,
    /// Added by hand through the dashboard.
    Manual,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::NewTicket => "new_ticket",
            TriggerType::StatusChange => "status_change",
            TriggerType::CommentAdded => "comment_added",
            TriggerType::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ticket tracked by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Readable id, e.g. `OPS-42`.
    pub id: String,
    /// Tracker-internal issue id.
    #[serde(default)]
    pub uuid: String,
    /// Tracker project the issue lives in.
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub title: String,
    /// Description as HTML, passed through untouched.
    #[serde(default)]
    pub description: String,
    /// Tracker state id.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub state_group: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// When the ticket entered the pending queue.
    pub admitted_at: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create a ticket with only an id and a trigger; everything else empty.
    pub fn new(id: impl Into<String>, trigger_type: TriggerType) -> Self {
        Self {
            id: id.into(),
            uuid: String::new(),
            project_id: String::new(),
            title: String::new(),
            description: String::new(),
            state: String::new(),
            state_group: None,
            priority: None,
            trigger_type,
            created_at: None,
            updated_at: None,
            admitted_at: Utc::now(),
            session_id: None,
            started_at: None,
            summary: None,
            completed_at: None,
        }
    }
}

/// The queue a ticket currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Pending,
    Active,
    Completed,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Pending => "pending",
            QueueState::Active => "active",
            QueueState::Completed => "completed",
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an idempotent admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    AlreadyQueued(QueueState),
}

/// Session created for an approved ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRef {
    pub ticket_id: String,
    pub session_id: String,
    pub project_id: String,
    pub command: String,
}

/// What happened when results were published to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub comment_posted: bool,
    pub state_updated: bool,
    /// Comment posted but the state transition failed.
    pub partial: bool,
}

/// Queue sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
}

/// Errors surfaced by the lifecycle engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The ticket is not in the queue the operation requires.
    #[error(
        "ticket {ticket_id} not found{}",
        .queue.map(|q| format!(" in {} queue", q)).unwrap_or_default()
    )]
    NotFound {
        ticket_id: String,
        queue: Option<QueueState>,
    },

    /// The operation collides with the ticket's current state or an in-flight call.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad ticket id or empty summary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator is unreachable or kept failing after retries.
    #[error("upstream unavailable: {0}")]
    UpstreamTransient(String),

    /// A collaborator refused the request.
    #[error("upstream rejected request (HTTP {status}): {message}")]
    UpstreamRejected { status: u16, message: String },
}

impl From<SessionError> for EngineError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rejected { status, message } => {
                EngineError::UpstreamRejected { status, message }
            }
            other => EngineError::UpstreamTransient(other.to_string()),
        }
    }
}

impl From<TrackerError> for EngineError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Http {
                status, message, ..
            } => EngineError::UpstreamRejected { status, message },
            other => EngineError::UpstreamTransient(other.to_string()),
        }
    }
}
