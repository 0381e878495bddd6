//! Polling scheduler implementation.
//!
//! Runs two independent loops:
//! - Trigger loop: polls the tracker and admits triggered tickets
//! - Completion loop: looks for completion artifacts of active tickets

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::completion::CompletionWatcher;
use crate::config::TriggerConfig;
use crate::lifecycle::{Admission, LifecycleEngine};
use crate::metrics::POLL_ERRORS;
use crate::tracker::TrackerError;

use super::config::SchedulerConfig;

/// Loop cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTimings {
    pub trigger_interval: Duration,
    pub error_backoff: Duration,
    pub completion_interval: Duration,
}

impl From<&SchedulerConfig> for SchedulerTimings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            trigger_interval: Duration::from_secs(config.trigger_poll_interval_secs),
            error_backoff: Duration::from_secs(config.error_backoff_secs),
            completion_interval: Duration::from_secs(config.completion_poll_interval_secs),
        }
    }
}

/// Drives the trigger and completion loops until stopped.
pub struct PollingScheduler {
    timings: SchedulerTimings,
    triggers: TriggerConfig,
    engine: Arc<LifecycleEngine>,
    watcher: Arc<CompletionWatcher>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new(
        timings: SchedulerTimings,
        triggers: TriggerConfig,
        engine: Arc<LifecycleEngine>,
        watcher: Arc<CompletionWatcher>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            timings,
            triggers,
            engine,
            watcher,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start both loops (spawns background tasks).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        info!(
            "Starting scheduler (trigger poll every {:?}, completion poll every {:?})",
            self.timings.trigger_interval, self.timings.completion_interval
        );

        let mut handles = self.handles.lock().await;
        handles.push(self.spawn_trigger_loop());
        handles.push(self.spawn_completion_loop());

        info!("Scheduler started");
    }

    /// Stop both loops, wait for them to finish, then close the HTTP clients.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping scheduler");

        // Signal shutdown to all workers
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Scheduler loop ended abnormally: {}", e);
            }
        }

        self.engine.tracker().close().await;
        self.engine.sessions().close().await;

        info!("Scheduler stopped");
    }

    /// Run one trigger poll. Returns the number of newly admitted tickets.
    pub async fn poll_once(&self) -> Result<usize, TrackerError> {
        Self::poll_triggers(&self.engine, &self.triggers).await
    }

    async fn poll_triggers(
        engine: &LifecycleEngine,
        triggers: &TriggerConfig,
    ) -> Result<usize, TrackerError> {
        let tickets = engine.tracker().poll().await?;

        let mut admitted = 0;
        for ticket in tickets {
            if !triggers.allows(ticket.trigger_type) {
                debug!(
                    "Ignoring {} trigger for ticket {} (disabled)",
                    ticket.trigger_type, ticket.id
                );
                continue;
            }

            let ticket_id = ticket.id.clone();
            match engine.admit(ticket) {
                Ok(Admission::Admitted) => admitted += 1,
                Ok(Admission::AlreadyQueued(state)) => {
                    debug!("Ticket {} already {}, not re-queued", ticket_id, state);
                }
                Err(e) => warn!("Could not admit ticket {}: {}", ticket_id, e),
            }
        }

        Ok(admitted)
    }

    fn spawn_trigger_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let engine = Arc::clone(&self.engine);
        let triggers = self.triggers.clone();
        let timings = self.timings;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Trigger loop started");
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                let delay = match Self::poll_triggers(&engine, &triggers).await {
                    Ok(admitted) => {
                        if admitted > 0 {
                            info!("Admitted {} ticket(s) to the pending queue", admitted);
                        }
                        timings.trigger_interval
                    }
                    Err(e) => {
                        error!("Trigger poll failed: {}", e);
                        POLL_ERRORS.with_label_values(&["trigger"]).inc();
                        timings.error_backoff
                    }
                };

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Trigger loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            info!("Trigger loop stopped");
        })
    }

    fn spawn_completion_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let engine = Arc::clone(&self.engine);
        let watcher = Arc::clone(&self.watcher);
        let interval = self.timings.completion_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Completion loop started");
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                let report = watcher.check_once(&engine).await;
                if !report.failed.is_empty() {
                    POLL_ERRORS.with_label_values(&["completion"]).inc();
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Completion loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Completion loop stopped");
        })
    }
}
