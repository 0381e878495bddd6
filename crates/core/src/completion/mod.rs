//! Out-of-band completion signals.
//!
//! The task runner writes a summary file when a session finishes; the watcher
//! turns it into a Completed ticket.

mod inbox;
mod watcher;

pub use inbox::{CompletionError, CompletionInbox, FsCompletionInbox};
pub use watcher::{CompletionCheck, CompletionReport, CompletionWatcher};
