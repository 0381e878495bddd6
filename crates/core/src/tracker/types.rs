//! Types for the ticket tracker client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::Ticket;

/// Issue as returned by the tracker's issue listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerIssue {
    /// Internal UUID.
    pub id: String,
    /// Per-project sequence number. Issues without one are ignored.
    #[serde(default)]
    pub sequence_id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description_html: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub state_detail: Option<StateDetail>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl TrackerIssue {
    /// State group carried inline, if the tracker expanded it.
    pub fn inline_group(&self) -> Option<&str> {
        self.state_detail
            .as_ref()
            .and_then(|d| d.group.as_deref())
            .filter(|g| !g.is_empty())
    }
}

/// Inline state expansion on an issue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateDetail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

/// A workflow state of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// One of backlog, unstarted, started, completed, cancelled.
    #[serde(default)]
    pub group: String,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerComment {
    pub id: String,
    #[serde(default)]
    pub comment_html: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub next_page_results: bool,
}

/// List endpoints answer either with a page envelope or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Paged(Page<T>),
    Bare(Vec<T>),
}

/// Result of a write call that reached the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 2xx.
    Applied,
    /// 4xx; terminal, never retried.
    Rejected { status: u16, message: String },
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}

/// Errors from the tracker client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// Network failure, timeout or 5xx after all attempts.
    #[error("{operation} failed after {attempts} attempt(s): {reason}")]
    Transient {
        operation: String,
        attempts: u32,
        reason: String,
    },

    /// Non-2xx answer to a read.
    #[error("{operation} returned HTTP {status}: {message}")]
    Http {
        operation: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Ticket tracker abstraction.
#[async_trait]
pub trait TicketTracker: Send + Sync {
    /// Tracker name for logging.
    fn name(&self) -> &str;

    /// List monitored projects and return the tickets whose trigger fired.
    async fn poll(&self) -> Result<Vec<Ticket>, TrackerError>;

    /// Post an HTML comment on an issue. Retried on transient failures.
    async fn add_comment(
        &self,
        project_id: &str,
        issue_uuid: &str,
        comment_html: &str,
    ) -> Result<WriteOutcome, TrackerError>;

    /// Move an issue to another workflow state. Retried on transient failures.
    async fn update_state(
        &self,
        project_id: &str,
        issue_uuid: &str,
        state_id: &str,
    ) -> Result<WriteOutcome, TrackerError>;

    /// Workflow states of a project.
    async fn list_states(&self, project_id: &str) -> Result<Vec<WorkflowState>, TrackerError>;

    /// Comments on an issue.
    async fn list_comments(
        &self,
        project_id: &str,
        issue_uuid: &str,
    ) -> Result<Vec<TrackerComment>, TrackerError>;

    /// Find the state used for "in progress" work.
    async fn resolve_in_progress_state(
        &self,
        project_id: &str,
    ) -> Result<Option<String>, TrackerError> {
        let states = self.list_states(project_id).await?;
        let found = pick_in_progress_state(&states).map(|s| s.id.clone());
        if found.is_none() {
            tracing::warn!("No in-progress state found for project {}", project_id);
        }
        Ok(found)
    }

    /// Release the HTTP client. Later calls recreate it.
    async fn close(&self);
}

/// Group `started` wins; otherwise fall back to well-known state names.
pub fn pick_in_progress_state(states: &[WorkflowState]) -> Option<&WorkflowState> {
    states.iter().find(|state| {
        let name = state.name.to_lowercase();
        state.group.eq_ignore_ascii_case("started")
            || name.contains("progress")
            || name.contains("started")
            || name.contains("doing")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str, name: &str, group: &str) -> WorkflowState {
        WorkflowState {
            id: id.to_string(),
            name: name.to_string(),
            group: group.to_string(),
        }
    }

    #[test]
    fn test_pick_in_progress_by_group() {
        let states = vec![
            state("s1", "Backlog", "backlog"),
            state("s2", "Working", "started"),
            state("s3", "Done", "completed"),
        ];
        assert_eq!(pick_in_progress_state(&states).unwrap().id, "s2");
    }

    #[test]
    fn test_pick_in_progress_by_name() {
        let states = vec![
            state("s1", "Todo", "unstarted"),
            state("s2", "Doing", "custom"),
        ];
        assert_eq!(pick_in_progress_state(&states).unwrap().id, "s2");
    }

    #[test]
    fn test_pick_in_progress_none() {
        let states = vec![state("s1", "Todo", "unstarted"), state("s2", "Done", "completed")];
        assert!(pick_in_progress_state(&states).is_none());
    }

    #[test]
    fn test_listing_accepts_envelope_and_bare_array() {
        let paged: Listing<WorkflowState> = serde_json::from_str(
            r#"{"results":[{"id":"s1","name":"Todo","group":"unstarted"}],"next_cursor":"100:1:0","next_page_results":true}"#,
        )
        .unwrap();
        match paged {
            Listing::Paged(page) => {
                assert_eq!(page.results.len(), 1);
                assert!(page.next_page_results);
                assert_eq!(page.next_cursor.as_deref(), Some("100:1:0"));
            }
            Listing::Bare(_) => panic!("expected envelope"),
        }

        let bare: Listing<WorkflowState> =
            serde_json::from_str(r#"[{"id":"s1"},{"id":"s2"}]"#).unwrap();
        assert!(matches!(bare, Listing::Bare(ref v) if v.len() == 2));
    }

    #[test]
    fn test_issue_inline_group() {
        let issue: TrackerIssue = serde_json::from_str(
            r#"{"id":"u1","sequence_id":3,"state":"s1","state_detail":{"group":"started"}}"#,
        )
        .unwrap();
        assert_eq!(issue.inline_group(), Some("started"));

        let issue: TrackerIssue = serde_json::from_str(r#"{"id":"u2"}"#).unwrap();
        assert_eq!(issue.inline_group(), None);
        assert!(issue.sequence_id.is_none());
    }

    #[test]
    fn test_error_display() {
        let err = TrackerError::Transient {
            operation: "add_comment".to_string(),
            attempts: 3,
            reason: "HTTP 503".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "add_comment failed after 3 attempt(s): HTTP 503"
        );
    }
}
