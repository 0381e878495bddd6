//! Ticket tracker abstraction.
//!
//! This module provides a `TicketTracker` trait for polling a tracker for
//! triggered tickets and writing results back, plus the Plane implementation.

mod plane;
mod snapshot;
mod types;

pub use plane::PlaneTrackerClient;
pub use snapshot::PollSnapshot;
pub use types::*;
