//! Queue transition table.
//!
//! Pure: no locking, no I/O. The engine asks this module whether a transition
//! is legal before mutating its maps.

use thiserror::Error;

use super::types::QueueState;

/// Operations that move a ticket between queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Admit,
    Approve,
    Complete,
    Publish,
    Delete,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("ticket is already queued as {0}")]
    AlreadyQueued(QueueState),

    #[error("ticket must be {expected}, found {actual:?}")]
    NotInExpectedQueue {
        expected: QueueState,
        actual: Option<QueueState>,
    },

    #[error("active tickets cannot be deleted")]
    ActiveNotDeletable,
}

impl Transition {
    /// Queue the transition starts from (used for error reporting).
    pub fn expected(&self) -> Option<QueueState> {
        match self {
            Transition::Admit => None,
            Transition::Approve => Some(QueueState::Pending),
            Transition::Complete => Some(QueueState::Active),
            Transition::Publish => Some(QueueState::Completed),
            Transition::Delete => None,
        }
    }
}

/// Compute the queue a ticket lands in. `Ok(None)` means it leaves all queues.
pub fn next_state(
    current: Option<QueueState>,
    transition: Transition,
) -> Result<Option<QueueState>, TransitionError> {
    use QueueState::{Active, Completed, Pending};

    match (current, transition) {
        (None, Transition::Admit) => Ok(Some(Pending)),
        (Some(state), Transition::Admit) => Err(TransitionError::AlreadyQueued(state)),

        (Some(Pending), Transition::Approve) => Ok(Some(Active)),
        (Some(Active), Transition::Complete) => Ok(Some(Completed)),
        (Some(Completed), Transition::Publish) => Ok(None),

        (Some(Pending), Transition::Delete) | (Some(Completed), Transition::Delete) => Ok(None),
        (Some(Active), Transition::Delete) => Err(TransitionError::ActiveNotDeletable),
        (None, Transition::Delete) => Err(TransitionError::NotInExpectedQueue {
            expected: Pending,
            actual: None,
        }),

        (actual, t) => Err(TransitionError::NotInExpectedQueue {
            // Only approve/complete/publish reach this arm.
            expected: t.expected().unwrap_or(Pending),
            actual,
        }),
    }
}
