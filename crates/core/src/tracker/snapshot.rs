//! Trigger detection by diffing consecutive polls.

use std::collections::{HashMap, HashSet};

use crate::lifecycle::TriggerType;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotEntry {
    project_id: String,
    state: Option<String>,
    updated_at: Option<String>,
}

/// Last observed state of every issue, keyed by readable id.
#[derive(Debug, Default)]
pub struct PollSnapshot {
    entries: HashMap<String, SnapshotEntry>,
}

impl PollSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, ticket_id: &str) -> bool {
        self.entries.contains_key(ticket_id)
    }

    /// Compare an observed issue with the snapshot and record the change.
    ///
    /// A first sighting only triggers when the issue is in a `started` or
    /// `unstarted` state group. A state change wins over an `updated_at`
    /// change when both happen between two polls.
    pub fn classify(
        &mut self,
        ticket_id: &str,
        project_id: &str,
        state: Option<&str>,
        state_group: Option<&str>,
        updated_at: Option<&str>,
    ) -> Option<TriggerType> {
        let Some(entry) = self.entries.get_mut(ticket_id) else {
            self.entries.insert(
                ticket_id.to_string(),
                SnapshotEntry {
                    project_id: project_id.to_string(),
                    state: state.map(str::to_string),
                    updated_at: updated_at.map(str::to_string),
                },
            );
            let group = state_group.unwrap_or_default().to_lowercase();
            return matches!(group.as_str(), "started" | "unstarted")
                .then_some(TriggerType::NewTicket);
        };

        if entry.state.as_deref() != state {
            entry.state = state.map(str::to_string);
            return Some(TriggerType::StatusChange);
        }

        if entry.updated_at.as_deref() != updated_at {
            entry.updated_at = updated_at.map(str::to_string);
            return Some(TriggerType::CommentAdded);
        }

        None
    }

    /// Drop entries of `project_id` that were not part of a complete listing.
    /// Returns how many were removed.
    pub fn prune_project(&mut self, project_id: &str, seen: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|id, entry| entry.project_id != project_id || seen.contains(id));
        before - self.entries.len()
    }
}
