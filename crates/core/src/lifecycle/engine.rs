//! Ticket lifecycle engine.
//!
//! Owns the Pending, Active and Completed queues. All queue mutations happen
//! inside one mutex and the lock is never held across an `.await`: remote
//! calls run between a "check and reserve" section and a "commit" section.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::AutomationConfig;
use crate::metrics::{
    QUEUE_DEPTH, SESSION_DURATION, TICKETS_ADMITTED, TICKETS_APPROVED, TICKETS_COMPLETED,
    TRACKER_UPDATES,
};
use crate::session::SessionService;
use crate::tracker::{TicketTracker, WriteOutcome};

use super::machine::{next_state, Transition, TransitionError};
use super::types::{
    Admission, EngineError, PublishOutcome, QueueCounts, QueueState, SessionRef, Ticket,
};

/// Longest accepted ticket id.
pub const MAX_TICKET_ID_LEN: usize = 128;

/// Ticket ids end up in shell commands, session ids and file names, so only a
/// conservative character set is accepted.
pub fn validate_ticket_id(ticket_id: &str) -> Result<(), EngineError> {
    if ticket_id.is_empty() || ticket_id.len() > MAX_TICKET_ID_LEN {
        return Err(EngineError::InvalidInput(format!(
            "ticket id must be 1-{} characters",
            MAX_TICKET_ID_LEN
        )));
    }
    if !ticket_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(EngineError::InvalidInput(format!(
            "ticket id {:?} contains unsupported characters",
            ticket_id
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Queues {
    pending: HashMap<String, Ticket>,
    active: HashMap<String, Ticket>,
    completed: HashMap<String, Ticket>,
    /// Tickets with a session creation in flight.
    approving: HashSet<String>,
    /// Tickets with a tracker write in flight.
    publishing: HashSet<String>,
}

impl Queues {
    fn queue_of(&self, ticket_id: &str) -> Option<QueueState> {
        if self.pending.contains_key(ticket_id) {
            Some(QueueState::Pending)
        } else if self.active.contains_key(ticket_id) {
            Some(QueueState::Active)
        } else if self.completed.contains_key(ticket_id) {
            Some(QueueState::Completed)
        } else {
            None
        }
    }

    fn in_flight(&self, ticket_id: &str) -> bool {
        self.approving.contains(ticket_id) || self.publishing.contains(ticket_id)
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            pending: self.pending.len(),
            active: self.active.len(),
            completed: self.completed.len(),
        }
    }

    fn publish_depth(&self) {
        QUEUE_DEPTH
            .with_label_values(&["pending"])
            .set(self.pending.len() as i64);
        QUEUE_DEPTH
            .with_label_values(&["active"])
            .set(self.active.len() as i64);
        QUEUE_DEPTH
            .with_label_values(&["completed"])
            .set(self.completed.len() as i64);
    }
}

#[derive(Debug, Clone, Copy)]
enum InFlightKind {
    Approve,
    Publish,
}

/// Clears an in-flight marker when dropped, including when the caller's
/// future is cancelled mid-request.
struct InFlight<'a> {
    queues: &'a Mutex<Queues>,
    kind: InFlightKind,
    ticket_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        match self.kind {
            InFlightKind::Approve => queues.approving.remove(&self.ticket_id),
            InFlightKind::Publish => queues.publishing.remove(&self.ticket_id),
        };
    }
}

/// Drives tickets through Pending -> Active -> Completed and back to the tracker.
pub struct LifecycleEngine {
    automation: AutomationConfig,
    tracker: Arc<dyn TicketTracker>,
    sessions: Arc<dyn SessionService>,
    queues: Mutex<Queues>,
}

impl LifecycleEngine {
    pub fn new(
        automation: AutomationConfig,
        tracker: Arc<dyn TicketTracker>,
        sessions: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            automation,
            tracker,
            sessions,
            queues: Mutex::new(Queues::default()),
        }
    }

    pub fn tracker(&self) -> &Arc<dyn TicketTracker> {
        &self.tracker
    }

    pub fn sessions(&self) -> &Arc<dyn SessionService> {
        &self.sessions
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a ticket into Pending unless it is already queued somewhere.
    ///
    /// Idempotent: a ticket already in any queue is left untouched.
    pub fn admit(&self, mut ticket: Ticket) -> Result<Admission, EngineError> {
        validate_ticket_id(&ticket.id)?;

        let mut queues = self.lock();
        match next_state(queues.queue_of(&ticket.id), Transition::Admit) {
            Ok(_) => {}
            Err(TransitionError::AlreadyQueued(state)) => {
                debug!("Ticket {} already queued as {}, skipping", ticket.id, state);
                return Ok(Admission::AlreadyQueued(state));
            }
            Err(e) => return Err(transition_error(&ticket.id, e)),
        }

        ticket.admitted_at = Utc::now();
        ticket.session_id = None;
        ticket.started_at = None;
        ticket.summary = None;
        ticket.completed_at = None;

        info!(
            "Added ticket {} to pending queue (trigger: {})",
            ticket.id, ticket.trigger_type
        );
        TICKETS_ADMITTED
            .with_label_values(&[ticket.trigger_type.as_str()])
            .inc();
        queues.pending.insert(ticket.id.clone(), ticket);
        queues.publish_depth();

        Ok(Admission::Admitted)
    }

    /// Dashboard variant of [`admit`](Self::admit) that reports duplicates as a conflict.
    pub fn add_pending(&self, ticket: Ticket) -> Result<(), EngineError> {
        let ticket_id = ticket.id.clone();
        match self.admit(ticket)? {
            Admission::Admitted => Ok(()),
            Admission::AlreadyQueued(state) => Err(EngineError::Conflict(format!(
                "ticket {} is already {}",
                ticket_id, state
            ))),
        }
    }

    pub fn list_pending(&self) -> Vec<Ticket> {
        sorted(self.lock().pending.values())
    }

    pub fn list_active(&self) -> Vec<Ticket> {
        sorted(self.lock().active.values())
    }

    pub fn list_completed(&self) -> Vec<Ticket> {
        sorted(self.lock().completed.values())
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.list_active().into_iter().map(|t| t.id).collect()
    }

    pub fn queue_of(&self, ticket_id: &str) -> Option<QueueState> {
        self.lock().queue_of(ticket_id)
    }

    pub fn counts(&self) -> QueueCounts {
        self.lock().counts()
    }

    /// Create a session for a pending ticket and move it to Active.
    ///
    /// The ticket only moves once the session service confirmed the session.
    /// On failure it stays Pending and the upstream error is returned.
    pub async fn approve(&self, ticket_id: &str) -> Result<SessionRef, EngineError> {
        let (session_id, command) = {
            let mut queues = self.lock();
            next_state(queues.queue_of(ticket_id), Transition::Approve)
                .map_err(|e| transition_error(ticket_id, e))?;
            if !queues.approving.insert(ticket_id.to_string()) {
                return Err(EngineError::Conflict(format!(
                    "approval of ticket {} is already in progress",
                    ticket_id
                )));
            }
            (
                self.session_id_for(ticket_id, Utc::now()),
                self.command_for(ticket_id),
            )
        };
        let _in_flight = InFlight {
            queues: &self.queues,
            kind: InFlightKind::Approve,
            ticket_id: ticket_id.to_string(),
        };

        info!("Creating session {} for ticket {}", session_id, ticket_id);
        if let Err(e) = self
            .sessions
            .create_session(&session_id, &self.automation.project_id, &command)
            .await
        {
            warn!(
                "Session creation for ticket {} failed, ticket stays pending: {}",
                ticket_id, e
            );
            return Err(e.into());
        }

        let mut queues = self.lock();
        // Delete refuses tickets with an approval in flight, so it is still pending.
        let Some(mut ticket) = queues.pending.remove(ticket_id) else {
            return Err(EngineError::NotFound {
                ticket_id: ticket_id.to_string(),
                queue: Some(QueueState::Pending),
            });
        };
        ticket.session_id = Some(session_id.clone());
        ticket.started_at = Some(Utc::now());
        queues.active.insert(ticket_id.to_string(), ticket);
        queues.publish_depth();
        TICKETS_APPROVED.inc();

        info!("Ticket {} approved, session {} started", ticket_id, session_id);
        Ok(SessionRef {
            ticket_id: ticket_id.to_string(),
            session_id,
            project_id: self.automation.project_id.clone(),
            command,
        })
    }

    /// Move an active ticket to Completed with the given summary.
    pub fn complete(&self, ticket_id: &str, summary: &str) -> Result<Ticket, EngineError> {
        let mut queues = self.lock();
        next_state(queues.queue_of(ticket_id), Transition::Complete)
            .map_err(|e| transition_error(ticket_id, e))?;

        let Some(mut ticket) = queues.active.remove(ticket_id) else {
            return Err(EngineError::NotFound {
                ticket_id: ticket_id.to_string(),
                queue: Some(QueueState::Active),
            });
        };

        let now = Utc::now();
        ticket.summary = Some(summary.to_string());
        ticket.completed_at = Some(now);

        match ticket.started_at {
            Some(started) if now >= started => {
                let seconds = (now - started).num_milliseconds() as f64 / 1000.0;
                SESSION_DURATION.observe(seconds);
            }
            Some(started) => warn!(
                "Ticket {} completed before its start time {}, skipping duration",
                ticket_id, started
            ),
            None => warn!("Ticket {} has no start time, skipping duration", ticket_id),
        }

        queues.completed.insert(ticket_id.to_string(), ticket.clone());
        queues.publish_depth();
        TICKETS_COMPLETED.inc();

        info!("Ticket {} marked as completed", ticket_id);
        Ok(ticket)
    }

    /// Manual completion from the dashboard. The summary must not be blank.
    pub fn mark_completed(&self, ticket_id: &str, summary: &str) -> Result<Ticket, EngineError> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(EngineError::InvalidInput(
                "summary cannot be empty".to_string(),
            ));
        }
        self.complete(ticket_id, summary)
    }

    /// Post the completion summary to the tracker and drop the ticket.
    ///
    /// `summary` overrides the one recorded at completion. The ticket is only
    /// removed once the comment was accepted; a failed state update after that
    /// is reported as a partial success.
    pub async fn publish(
        &self,
        ticket_id: &str,
        summary: Option<&str>,
    ) -> Result<PublishOutcome, EngineError> {
        let (ticket, summary) = {
            let mut queues = self.lock();
            next_state(queues.queue_of(ticket_id), Transition::Publish)
                .map_err(|e| transition_error(ticket_id, e))?;
            let Some(ticket) = queues.completed.get(ticket_id).cloned() else {
                return Err(EngineError::NotFound {
                    ticket_id: ticket_id.to_string(),
                    queue: Some(QueueState::Completed),
                });
            };

            let summary = summary
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| ticket.summary.clone())
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| EngineError::InvalidInput("summary cannot be empty".to_string()))?;
            if ticket.uuid.is_empty() || ticket.project_id.is_empty() {
                return Err(EngineError::InvalidInput(format!(
                    "ticket {} is not linked to a tracker issue",
                    ticket_id
                )));
            }

            if !queues.publishing.insert(ticket_id.to_string()) {
                return Err(EngineError::Conflict(format!(
                    "publish of ticket {} is already in progress",
                    ticket_id
                )));
            }
            (ticket, summary)
        };
        let _in_flight = InFlight {
            queues: &self.queues,
            kind: InFlightKind::Publish,
            ticket_id: ticket_id.to_string(),
        };

        let comment = render_comment(&summary, &self.automation.comment_footer);
        match self
            .tracker
            .add_comment(&ticket.project_id, &ticket.uuid, &comment)
            .await
        {
            Ok(WriteOutcome::Applied) => {}
            Ok(WriteOutcome::Rejected { status, message }) => {
                TRACKER_UPDATES.with_label_values(&["failed_comment"]).inc();
                warn!(
                    "Tracker rejected comment for ticket {}, keeping it completed",
                    ticket_id
                );
                return Err(EngineError::UpstreamRejected { status, message });
            }
            Err(e) => {
                TRACKER_UPDATES.with_label_values(&["failed_comment"]).inc();
                warn!(
                    "Could not post comment for ticket {}, keeping it completed: {}",
                    ticket_id, e
                );
                return Err(e.into());
            }
        }

        let state_updated = self.advance_tracker_state(&ticket).await;

        {
            let mut queues = self.lock();
            queues.completed.remove(ticket_id);
            queues.publish_depth();
        }

        if state_updated {
            TRACKER_UPDATES.with_label_values(&["success"]).inc();
            info!("Published results of ticket {} to the tracker", ticket_id);
        } else {
            TRACKER_UPDATES.with_label_values(&["failed_state"]).inc();
            warn!(
                "Comment posted for ticket {} but its tracker state was not updated",
                ticket_id
            );
        }

        if self.automation.cleanup_session_on_publish {
            if let Some(session_id) = &ticket.session_id {
                if let Err(e) = self.sessions.delete_session(session_id).await {
                    warn!("Failed to clean up session {}: {}", session_id, e);
                }
            }
        }

        Ok(PublishOutcome {
            comment_posted: true,
            state_updated,
            partial: !state_updated,
        })
    }

    /// Remove a ticket from Pending or Completed. Active tickets are refused.
    pub fn delete(&self, ticket_id: &str) -> Result<QueueState, EngineError> {
        let mut queues = self.lock();
        if queues.in_flight(ticket_id) {
            return Err(EngineError::Conflict(format!(
                "ticket {} has an operation in progress",
                ticket_id
            )));
        }

        let current = queues.queue_of(ticket_id);
        next_state(current, Transition::Delete).map_err(|e| match e {
            TransitionError::NotInExpectedQueue { actual: None, .. } => EngineError::NotFound {
                ticket_id: ticket_id.to_string(),
                queue: None,
            },
            other => transition_error(ticket_id, other),
        })?;

        let removed_from = match current {
            Some(QueueState::Pending) => queues.pending.remove(ticket_id).map(|_| QueueState::Pending),
            Some(QueueState::Completed) => queues
                .completed
                .remove(ticket_id)
                .map(|_| QueueState::Completed),
            _ => None,
        };
        queues.publish_depth();

        let removed_from = removed_from.ok_or_else(|| EngineError::NotFound {
            ticket_id: ticket_id.to_string(),
            queue: None,
        })?;
        info!("Deleted ticket {} from {} queue", ticket_id, removed_from);
        Ok(removed_from)
    }

    /// Move the tracker issue to the in-progress state. Best effort.
    async fn advance_tracker_state(&self, ticket: &Ticket) -> bool {
        let state_id = match self
            .tracker
            .resolve_in_progress_state(&ticket.project_id)
            .await
        {
            Ok(Some(state_id)) => state_id,
            Ok(None) => return false,
            Err(e) => {
                warn!(
                    "Could not resolve tracker states for ticket {}: {}",
                    ticket.id, e
                );
                return false;
            }
        };

        match self
            .tracker
            .update_state(&ticket.project_id, &ticket.uuid, &state_id)
            .await
        {
            Ok(WriteOutcome::Applied) => true,
            Ok(WriteOutcome::Rejected { status, message }) => {
                warn!(
                    "Tracker rejected state update for ticket {} (HTTP {}): {}",
                    ticket.id, status, message
                );
                false
            }
            Err(e) => {
                warn!("State update for ticket {} failed: {}", ticket.id, e);
                false
            }
        }
    }

    fn session_id_for(&self, ticket_id: &str, now: DateTime<Utc>) -> String {
        format!(
            "{}{}-{}",
            self.automation.session_prefix,
            ticket_id,
            now.format("%Y%m%d-%H%M%S")
        )
    }

    fn command_for(&self, ticket_id: &str) -> String {
        self.automation
            .worker_command
            .replace("{repo_path}", &self.automation.repo_path.display().to_string())
            .replace("{ticket_id}", ticket_id)
    }
}

fn transition_error(ticket_id: &str, err: TransitionError) -> EngineError {
    match err {
        TransitionError::NotInExpectedQueue { expected, .. } => EngineError::NotFound {
            ticket_id: ticket_id.to_string(),
            queue: Some(expected),
        },
        TransitionError::AlreadyQueued(state) => {
            EngineError::Conflict(format!("ticket {} is already {}", ticket_id, state))
        }
        TransitionError::ActiveNotDeletable => EngineError::Conflict(format!(
            "ticket {} has an active session and cannot be deleted",
            ticket_id
        )),
    }
}

fn sorted<'a>(tickets: impl Iterator<Item = &'a Ticket>) -> Vec<Ticket> {
    let mut list: Vec<Ticket> = tickets.cloned().collect();
    list.sort_by(|a, b| a.admitted_at.cmp(&b.admitted_at).then_with(|| a.id.cmp(&b.id)));
    list
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
    out
}

/// Tracker comment body: the summary, then the footer.
pub fn render_comment(summary: &str, footer: &str) -> String {
    let mut html = format!("<p>{}</p>", escape_html(summary));
    if !footer.is_empty() {
        html.push_str(&format!("<p><em>{}</em></p>", escape_html(footer)));
    }
    html
}
