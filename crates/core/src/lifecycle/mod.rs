//! Ticket lifecycle: Pending -> Active -> Completed.
//!
//! - `machine` is the pure transition table
//! - `engine` owns the queues and talks to the tracker and session service

mod engine;
pub mod machine;
mod types;

pub use engine::{render_comment, validate_ticket_id, LifecycleEngine, MAX_TICKET_ID_LEN};
pub use machine::{next_state, Transition, TransitionError};
pub use types::*;
