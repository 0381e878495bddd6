use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Serde already enforces the presence of the `[tracker]` section; this checks
/// the values that would only fail later at runtime.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let tracker = &config.tracker;
    if tracker.api_url.trim().is_empty() {
        return Err(invalid("tracker.api_url cannot be empty"));
    }
    if tracker.workspace_slug.trim().is_empty() {
        return Err(invalid("tracker.workspace_slug cannot be empty"));
    }
    if tracker.project_identifier.trim().is_empty() {
        return Err(invalid("tracker.project_identifier cannot be empty"));
    }
    if tracker.retry.max_attempts == 0 {
        return Err(invalid("tracker.retry.max_attempts must be at least 1"));
    }

    if config.session_service.url.trim().is_empty() {
        return Err(invalid("session_service.url cannot be empty"));
    }
    if config.session_service.retry.max_attempts == 0 {
        return Err(invalid(
            "session_service.retry.max_attempts must be at least 1",
        ));
    }

    if !config.automation.worker_command.contains("{ticket_id}") {
        return Err(invalid(
            "automation.worker_command must contain the {ticket_id} placeholder",
        ));
    }

    let scheduler = &config.scheduler;
    if scheduler.trigger_poll_interval_secs == 0 || scheduler.completion_poll_interval_secs == 0 {
        return Err(invalid("scheduler poll intervals cannot be 0"));
    }
    if scheduler.error_backoff_secs == 0 {
        return Err(invalid("scheduler.error_backoff_secs cannot be 0"));
    }
    if scheduler.completion_poll_interval_secs >= scheduler.trigger_poll_interval_secs {
        return Err(invalid(
            "scheduler.completion_poll_interval_secs must be shorter than trigger_poll_interval_secs",
        ));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
