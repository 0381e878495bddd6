//! Mock ticket tracker for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::lifecycle::Ticket;
use crate::tracker::{TicketTracker, TrackerComment, TrackerError, WorkflowState, WriteOutcome};

/// A recorded add_comment call.
#[derive(Debug, Clone)]
pub struct RecordedComment {
    pub project_id: String,
    pub issue_uuid: String,
    pub comment_html: String,
    pub timestamp: DateTime<Utc>,
}

/// A recorded update_state call.
#[derive(Debug, Clone)]
pub struct RecordedStateUpdate {
    pub project_id: String,
    pub issue_uuid: String,
    pub state_id: String,
}

/// Mock implementation of the TicketTracker trait.
///
/// - Poll results are queued and handed out in order; an empty queue polls nothing
/// - Writes are recorded and answer with a configurable result
/// - Exposes the default "In Progress" workflow state `state-in-progress`
///
/// # Example
///
/// ```rust,ignore
/// let tracker = MockTracker::new();
/// tracker.push_poll(Ok(vec![fixtures::ticket("OPS-1")])).await;
///
/// let triggered = tracker.poll().await?;
/// assert_eq!(triggered.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockTracker {
    polls: Arc<RwLock<VecDeque<Result<Vec<Ticket>, TrackerError>>>>,
    poll_count: Arc<RwLock<usize>>,
    comments: Arc<RwLock<Vec<RecordedComment>>>,
    state_updates: Arc<RwLock<Vec<RecordedStateUpdate>>>,
    comment_result: Arc<RwLock<Result<WriteOutcome, TrackerError>>>,
    state_result: Arc<RwLock<Result<WriteOutcome, TrackerError>>>,
    states: Arc<RwLock<Vec<WorkflowState>>>,
    closed: Arc<RwLock<bool>>,
}

impl Default for MockTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTracker {
    pub fn new() -> Self {
        Self {
            polls: Arc::new(RwLock::new(VecDeque::new())),
            poll_count: Arc::new(RwLock::new(0)),
            comments: Arc::new(RwLock::new(Vec::new())),
            state_updates: Arc::new(RwLock::new(Vec::new())),
            comment_result: Arc::new(RwLock::new(Ok(WriteOutcome::Applied))),
            state_result: Arc::new(RwLock::new(Ok(WriteOutcome::Applied))),
            states: Arc::new(RwLock::new(vec![
                WorkflowState {
                    id: "state-todo".to_string(),
                    name: "Todo".to_string(),
                    group: "unstarted".to_string(),
                },
                WorkflowState {
                    id: "state-in-progress".to_string(),
                    name: "In Progress".to_string(),
                    group: "started".to_string(),
                },
            ])),
            closed: Arc::new(RwLock::new(false)),
        }
    }

    /// Queue the result of a future poll.
    pub async fn push_poll(&self, result: Result<Vec<Ticket>, TrackerError>) {
        self.polls.write().await.push_back(result);
    }

    /// How many times poll() was called.
    pub async fn poll_count(&self) -> usize {
        *self.poll_count.read().await
    }

    pub async fn comments(&self) -> Vec<RecordedComment> {
        self.comments.read().await.clone()
    }

    pub async fn state_updates(&self) -> Vec<RecordedStateUpdate> {
        self.state_updates.read().await.clone()
    }

    /// Result returned by every add_comment call from now on.
    pub async fn set_comment_result(&self, result: Result<WriteOutcome, TrackerError>) {
        *self.comment_result.write().await = result;
    }

    /// Result returned by every update_state call from now on.
    pub async fn set_state_result(&self, result: Result<WriteOutcome, TrackerError>) {
        *self.state_result.write().await = result;
    }

    pub async fn set_states(&self, states: Vec<WorkflowState>) {
        *self.states.write().await = states;
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }
}

#[async_trait]
impl TicketTracker for MockTracker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn poll(&self) -> Result<Vec<Ticket>, TrackerError> {
        *self.poll_count.write().await += 1;
        self.polls
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn add_comment(
        &self,
        project_id: &str,
        issue_uuid: &str,
        comment_html: &str,
    ) -> Result<WriteOutcome, TrackerError> {
        self.comments.write().await.push(RecordedComment {
            project_id: project_id.to_string(),
            issue_uuid: issue_uuid.to_string(),
            comment_html: comment_html.to_string(),
            timestamp: Utc::now(),
        });
        self.comment_result.read().await.clone()
    }

    async fn update_state(
        &self,
        project_id: &str,
        issue_uuid: &str,
        state_id: &str,
    ) -> Result<WriteOutcome, TrackerError> {
        self.state_updates.write().await.push(RecordedStateUpdate {
            project_id: project_id.to_string(),
            issue_uuid: issue_uuid.to_string(),
            state_id: state_id.to_string(),
        });
        self.state_result.read().await.clone()
    }

    async fn list_states(&self, _project_id: &str) -> Result<Vec<WorkflowState>, TrackerError> {
        Ok(self.states.read().await.clone())
    }

    async fn list_comments(
        &self,
        _project_id: &str,
        issue_uuid: &str,
    ) -> Result<Vec<TrackerComment>, TrackerError> {
        Ok(self
            .comments
            .read()
            .await
            .iter()
            .filter(|c| c.issue_uuid == issue_uuid)
            .enumerate()
            .map(|(i, c)| TrackerComment {
                id: format!("comment-{}", i + 1),
                comment_html: c.comment_html.clone(),
                created_at: Some(c.timestamp.to_rfc3339()),
            })
            .collect())
    }

    async fn close(&self) {
        *self.closed.write().await = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_polls_are_handed_out_in_order() {
        let tracker = MockTracker::new();
        tracker.push_poll(Ok(vec![fixtures::ticket("OPS-1")])).await;
        tracker
            .push_poll(Err(TrackerError::Internal("down".to_string())))
            .await;

        assert_eq!(tracker.poll().await.unwrap().len(), 1);
        assert!(tracker.poll().await.is_err());
        assert!(tracker.poll().await.unwrap().is_empty());
        assert_eq!(tracker.poll_count().await, 3);
    }

    #[tokio::test]
    async fn test_resolves_default_in_progress_state() {
        let tracker = MockTracker::new();
        assert_eq!(
            tracker.resolve_in_progress_state("p").await.unwrap(),
            Some("state-in-progress".to_string())
        );

        tracker.set_states(Vec::new()).await;
        assert_eq!(tracker.resolve_in_progress_state("p").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_comments_are_recorded_and_listed() {
        let tracker = MockTracker::new();
        tracker.add_comment("p", "u1", "<p>hi</p>").await.unwrap();
        tracker.add_comment("p", "u2", "<p>other</p>").await.unwrap();

        let listed = tracker.list_comments("p", "u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].comment_html, "<p>hi</p>");
    }
}
