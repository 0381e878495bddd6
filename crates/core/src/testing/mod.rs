//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! so the engine, scheduler and HTTP surface can be exercised without a
//! tracker or a session service.
//!
//! # Example
//!
//! ```rust,ignore
//! use conductor_core::testing::{fixtures, MockSessionService, MockTracker};
//!
//! let tracker = Arc::new(MockTracker::new());
//! let sessions = Arc::new(MockSessionService::new());
//!
//! // Configure mock responses
//! tracker.push_poll(Ok(vec![fixtures::ticket("OPS-1")])).await;
//! sessions.set_healthy(false).await;
//! ```

mod mock_session;
mod mock_tracker;

pub use mock_session::{MockSessionService, RecordedSession};
pub use mock_tracker::{MockTracker, RecordedComment, RecordedStateUpdate};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::lifecycle::{Ticket, TriggerType};

    /// A ticket as the tracker poll would produce it.
    pub fn ticket(id: &str) -> Ticket {
        Ticket {
            uuid: format!("uuid-{}", id),
            project_id: "project-1".to_string(),
            title: format!("Ticket {}", id),
            description: "<p>Something to do</p>".to_string(),
            state: "state-todo".to_string(),
            state_group: Some("unstarted".to_string()),
            priority: Some("medium".to_string()),
            created_at: Some("2024-01-01T10:00:00Z".to_string()),
            updated_at: Some("2024-01-01T10:00:00Z".to_string()),
            ..Ticket::new(id, TriggerType::NewTicket)
        }
    }

    /// A ticket carrying a specific trigger.
    pub fn triggered(id: &str, trigger_type: TriggerType) -> Ticket {
        Ticket {
            trigger_type,
            ..ticket(id)
        }
    }
}
