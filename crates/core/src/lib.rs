pub mod completion;
pub mod config;
pub mod lifecycle;
pub mod metrics;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod testing;
pub mod tracker;

pub use completion::{
    CompletionCheck, CompletionError, CompletionReport, CompletionWatcher, FsCompletionInbox,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use lifecycle::{
    EngineError, LifecycleEngine, PublishOutcome, QueueCounts, QueueState, SessionRef, Ticket,
    TriggerType,
};
pub use scheduler::{PollingScheduler, SchedulerConfig, SchedulerTimings};
pub use session::{SessionError, SessionInfo, SessionService, SessionServiceClient};
pub use tracker::{PlaneTrackerClient, TicketTracker};
