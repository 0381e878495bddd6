//! Background polling.
//!
//! - **Triggers**: polls the tracker and admits triggered tickets
//! - **Completions**: consumes completion artifacts of active tickets
//!
//! Both loops finish their current iteration before honoring shutdown.

mod config;
mod runner;

pub use config::SchedulerConfig;
pub use runner::{PollingScheduler, SchedulerTimings};
