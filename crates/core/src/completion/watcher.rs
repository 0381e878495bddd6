//! Moves active tickets to Completed when their artifact shows up.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::lifecycle::{validate_ticket_id, EngineError, LifecycleEngine, QueueState};

use super::inbox::{CompletionError, CompletionInbox};

/// Tally of one pass over the active tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    /// Tickets moved to Completed.
    pub completed: Vec<String>,
    /// Tickets whose artifact exists but is empty.
    pub empty: Vec<String>,
    /// Tickets whose artifact could not be read or processed.
    pub failed: Vec<String>,
}

/// What a manual check found for a single ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionCheck {
    /// No artifact yet.
    Waiting,
    /// Artifact present but blank; left in place.
    Empty,
    /// Artifact consumed and the ticket moved to Completed.
    Completed { summary: String },
    /// Artifact consumed, but the ticket was no longer active.
    Discarded,
    /// Artifact present for a ticket that is not active; left in place.
    Ready { summary: String },
}

pub struct CompletionWatcher {
    inbox: Arc<dyn CompletionInbox>,
}

impl CompletionWatcher {
    pub fn new(inbox: Arc<dyn CompletionInbox>) -> Self {
        Self { inbox }
    }

    /// Check every active ticket once.
    pub async fn check_once(&self, engine: &LifecycleEngine) -> CompletionReport {
        let mut report = CompletionReport::default();

        for ticket_id in engine.active_ids() {
            match self.process(engine, &ticket_id).await {
                Ok(CompletionCheck::Waiting)
                | Ok(CompletionCheck::Discarded)
                | Ok(CompletionCheck::Ready { .. }) => {}
                Ok(CompletionCheck::Empty) => report.empty.push(ticket_id),
                Ok(CompletionCheck::Completed { .. }) => report.completed.push(ticket_id),
                Err(e) => {
                    error!("Error checking completion for ticket {}: {}", ticket_id, e);
                    report.failed.push(ticket_id);
                }
            }
        }

        if !report.completed.is_empty() {
            info!("Detected {} completed ticket(s)", report.completed.len());
        }
        report
    }

    /// Check one ticket, completing it if it is active and its artifact is
    /// there. For any other ticket the artifact is only read.
    pub async fn check_completion(
        &self,
        engine: &LifecycleEngine,
        ticket_id: &str,
    ) -> Result<CompletionCheck, CompletionError> {
        validate_ticket_id(ticket_id)
            .map_err(|e| CompletionError::InvalidTicketId(e.to_string()))?;

        if engine.queue_of(ticket_id) == Some(QueueState::Active) {
            return self.process(engine, ticket_id).await;
        }

        Ok(match self.inbox.peek(ticket_id).await? {
            None => CompletionCheck::Waiting,
            Some(summary) if summary.is_empty() => CompletionCheck::Empty,
            Some(summary) => CompletionCheck::Ready { summary },
        })
    }

    async fn process(
        &self,
        engine: &LifecycleEngine,
        ticket_id: &str,
    ) -> Result<CompletionCheck, CompletionError> {
        let Some(summary) = self.inbox.peek(ticket_id).await? else {
            return Ok(CompletionCheck::Waiting);
        };

        if summary.is_empty() {
            warn!("Empty completion artifact for ticket {}", ticket_id);
            return Ok(CompletionCheck::Empty);
        }

        let check = match engine.complete(ticket_id, &summary) {
            Ok(_) => {
                info!("Completion detected for ticket {}", ticket_id);
                CompletionCheck::Completed { summary }
            }
            Err(EngineError::NotFound { .. }) => {
                // Completed or deleted through another path; the artifact is stale.
                debug!("Ticket {} is no longer active, discarding artifact", ticket_id);
                CompletionCheck::Discarded
            }
            Err(e) => {
                warn!("Could not complete ticket {}: {}", ticket_id, e);
                return Ok(CompletionCheck::Waiting);
            }
        };

        if let Err(e) = self.inbox.acknowledge(ticket_id).await {
            warn!("Failed to remove completion artifact for {}: {}", ticket_id, e);
        }

        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::FsCompletionInbox;
    use crate::config::AutomationConfig;
    use crate::testing::{fixtures, MockSessionService, MockTracker};
    use tempfile::TempDir;

    struct Setup {
        _dir: TempDir,
        inbox: Arc<FsCompletionInbox>,
        watcher: CompletionWatcher,
        engine: LifecycleEngine,
    }

    async fn setup_with_active(ids: &[&str]) -> Setup {
        let dir = TempDir::new().unwrap();
        let inbox = Arc::new(FsCompletionInbox::new(dir.path()));
        let engine = LifecycleEngine::new(
            AutomationConfig::default(),
            Arc::new(MockTracker::new()),
            Arc::new(MockSessionService::new()),
        );
        for id in ids {
            engine.admit(fixtures::ticket(id)).unwrap();
            engine.approve(id).await.unwrap();
        }
        Setup {
            _dir: dir,
            watcher: CompletionWatcher::new(inbox.clone()),
            inbox,
            engine,
        }
    }

    #[tokio::test]
    async fn test_check_once_completes_and_consumes() {
        let s = setup_with_active(&["OPS-1", "OPS-2"]).await;
        std::fs::write(s.inbox.path_for("OPS-1"), "Implemented the fix\n").unwrap();

        let report = s.watcher.check_once(&s.engine).await;

        assert_eq!(report.completed, vec!["OPS-1".to_string()]);
        assert!(report.empty.is_empty());
        assert_eq!(s.engine.queue_of("OPS-1"), Some(QueueState::Completed));
        assert_eq!(s.engine.queue_of("OPS-2"), Some(QueueState::Active));
        assert!(!s.inbox.path_for("OPS-1").exists());

        let completed = s.engine.list_completed();
        assert_eq!(completed[0].summary.as_deref(), Some("Implemented the fix"));
    }

    #[tokio::test]
    async fn test_empty_artifact_is_left_alone() {
        let s = setup_with_active(&["OPS-1"]).await;
        std::fs::write(s.inbox.path_for("OPS-1"), "   \n").unwrap();

        let report = s.watcher.check_once(&s.engine).await;

        assert_eq!(report.empty, vec!["OPS-1".to_string()]);
        assert_eq!(s.engine.queue_of("OPS-1"), Some(QueueState::Active));
        assert!(s.inbox.path_for("OPS-1").exists());
    }

    #[tokio::test]
    async fn test_artifacts_of_inactive_tickets_are_ignored() {
        let s = setup_with_active(&[]).await;
        s.engine.admit(fixtures::ticket("OPS-3")).unwrap();
        std::fs::write(s.inbox.path_for("OPS-3"), "done").unwrap();

        let report = s.watcher.check_once(&s.engine).await;

        assert_eq!(report, CompletionReport::default());
        assert_eq!(s.engine.queue_of("OPS-3"), Some(QueueState::Pending));
    }

    #[tokio::test]
    async fn test_manual_check() {
        let s = setup_with_active(&["OPS-1"]).await;
        assert_eq!(
            s.watcher.check_completion(&s.engine, "OPS-1").await.unwrap(),
            CompletionCheck::Waiting
        );

        std::fs::write(s.inbox.path_for("OPS-1"), "ok").unwrap();
        assert_eq!(
            s.watcher.check_completion(&s.engine, "OPS-1").await.unwrap(),
            CompletionCheck::Completed {
                summary: "ok".to_string()
            }
        );

        // Once completed, a new artifact is only read.
        std::fs::write(s.inbox.path_for("OPS-1"), "again").unwrap();
        assert_eq!(
            s.watcher.check_completion(&s.engine, "OPS-1").await.unwrap(),
            CompletionCheck::Ready {
                summary: "again".to_string()
            }
        );
        assert!(s.inbox.path_for("OPS-1").exists());
        assert_eq!(s.engine.queue_of("OPS-1"), Some(QueueState::Completed));
    }

    #[tokio::test]
    async fn test_manual_check_leaves_inactive_artifacts() {
        let s = setup_with_active(&[]).await;
        s.engine.admit(fixtures::ticket("OPS-3")).unwrap();
        std::fs::write(s.inbox.path_for("OPS-3"), "done").unwrap();
        std::fs::write(s.inbox.path_for("NOPE-9"), "orphan").unwrap();

        assert_eq!(
            s.watcher.check_completion(&s.engine, "OPS-3").await.unwrap(),
            CompletionCheck::Ready {
                summary: "done".to_string()
            }
        );
        assert_eq!(s.engine.queue_of("OPS-3"), Some(QueueState::Pending));
        assert!(s.inbox.path_for("OPS-3").exists());

        assert_eq!(
            s.watcher.check_completion(&s.engine, "NOPE-9").await.unwrap(),
            CompletionCheck::Ready {
                summary: "orphan".to_string()
            }
        );
        assert!(s.inbox.path_for("NOPE-9").exists());
        assert_eq!(
            s.watcher.check_completion(&s.engine, "NOPE-10").await.unwrap(),
            CompletionCheck::Waiting
        );
    }

    #[tokio::test]
    async fn test_manual_check_rejects_bad_ids() {
        let s = setup_with_active(&[]).await;

        let err = s
            .watcher
            .check_completion(&s.engine, "../secrets")
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidTicketId(_)));
    }
}
