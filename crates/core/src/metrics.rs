//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket lifecycle (admissions, approvals, completions, publishes)
//! - Tracker API calls and retries
//! - Polling loop health

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts,
};

// =============================================================================
// Ticket Lifecycle Metrics
// =============================================================================

/// Tickets admitted into the pending queue, by trigger type.
pub static TICKETS_ADMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conductor_tickets_admitted_total",
            "Total tickets admitted into the pending queue",
        ),
        &["trigger"], // "new_ticket", "status_change", "comment_added", "manual"
    )
    .unwrap()
});

/// Tickets approved with a session created.
pub static TICKETS_APPROVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conductor_tickets_approved_total",
        "Total tickets approved and sessions created",
    )
    .unwrap()
});

/// Tickets that reached the completed queue.
pub static TICKETS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conductor_tickets_completed_total",
        "Total tickets marked as completed",
    )
    .unwrap()
});

/// Publish attempts by outcome.
pub static TRACKER_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conductor_tracker_updates_total",
            "Total tracker ticket updates by outcome",
        ),
        &["status"], // "success", "failed_comment", "failed_state"
    )
    .unwrap()
});

/// Current queue sizes.
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("conductor_queue_depth", "Number of tickets per queue"),
        &["queue"], // "pending", "active", "completed"
    )
    .unwrap()
});

/// Time from session creation to completion.
pub static SESSION_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "conductor_session_duration_seconds",
            "Time from session creation to completion",
        )
        .buckets(vec![60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0, 14400.0]),
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Tracker API calls by operation and status.
pub static TRACKER_API_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conductor_tracker_api_calls_total",
            "Total tracker API calls",
        ),
        &["operation", "status"], // status: "success", "rejected", "error"
    )
    .unwrap()
});

/// Retries performed by operation.
pub static TRACKER_API_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conductor_tracker_api_retry_total",
            "Total retry attempts against remote APIs",
        ),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Failed loop iterations.
pub static POLL_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conductor_poll_errors_total",
            "Polling loop iterations that failed",
        ),
        &["loop"], // "trigger", "completion"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lifecycle
        Box::new(TICKETS_ADMITTED.clone()),
        Box::new(TICKETS_APPROVED.clone()),
        Box::new(TICKETS_COMPLETED.clone()),
        Box::new(TRACKER_UPDATES.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(SESSION_DURATION.clone()),
        // External services
        Box::new(TRACKER_API_CALLS.clone()),
        Box::new(TRACKER_API_RETRIES.clone()),
        // Scheduler
        Box::new(POLL_ERRORS.clone()),
    ]
}
