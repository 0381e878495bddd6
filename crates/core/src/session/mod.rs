//! Session service abstraction.
//!
//! Sessions are isolated terminal sessions (tmux) in which the worker command
//! for an approved ticket runs.

mod client;
mod types;

pub use client::SessionServiceClient;
pub use types::*;
