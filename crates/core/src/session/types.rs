//! Types for the session service client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A session as reported by the session service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionEnvelope {
    #[serde(default)]
    pub session: Option<SessionInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionList {
    #[serde(default)]
    pub sessions: Vec<SessionInfo>,
}

/// Errors from the session service client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Unreachable, timed out or 5xx after all attempts.
    #[error("session service unavailable: {0}")]
    Transient(String),

    /// 4xx answer.
    #[error("session service rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode session service response: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Session service abstraction.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    /// Create or ensure a session exists (idempotent upsert).
    async fn create_session(
        &self,
        session_id: &str,
        project_id: &str,
        command: &str,
    ) -> Result<SessionInfo, SessionError>;

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError>;

    async fn session_exists(&self, session_id: &str) -> Result<bool, SessionError> {
        let sessions = self.list_sessions().await?;
        Ok(sessions.iter().any(|s| s.session_id == session_id))
    }

    /// True when the service answers its health endpoint with 200.
    async fn health_check(&self) -> bool;

    /// Release the HTTP client. Later calls recreate it.
    async fn close(&self);
}
