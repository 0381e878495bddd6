use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::lifecycle::TriggerType;
use crate::retry::RetryPolicy;
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub session_service: SessionServiceConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5002
}

/// Ticket tracker (Plane) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Base URL of the tracker API (e.g., "https://plane.example.com/api/v1")
    pub api_url: String,
    /// Static API key sent as `X-Api-Key`
    #[serde(default)]
    pub api_token: String,
    /// Workspace slug
    pub workspace_slug: String,
    /// Readable project identifier used to build ticket ids (e.g., "OPS")
    pub project_identifier: String,
    /// Project UUIDs to monitor
    #[serde(default)]
    pub project_ids: Vec<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retry policy for write operations
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Session service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionServiceConfig {
    /// Base URL of the session service (e.g., "http://localhost:5001")
    #[serde(default = "default_session_url")]
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retry policy for the idempotent session upsert
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for SessionServiceConfig {
    fn default() -> Self {
        Self {
            url: default_session_url(),
            timeout_secs: default_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_session_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// What gets launched when a ticket is approved, and how results are reported.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutomationConfig {
    /// Repository the worker runs in; substituted for `{repo_path}`.
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,
    /// Prefix for generated session ids.
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
    /// Project id the sessions are grouped under in the session service.
    #[serde(default = "default_session_project")]
    pub project_id: String,
    /// Shell command template. `{repo_path}` and `{ticket_id}` are substituted.
    #[serde(default = "default_worker_command")]
    pub worker_command: String,
    /// Footer appended to the tracker comment on publish.
    #[serde(default = "default_comment_footer")]
    pub comment_footer: String,
    /// Delete the session from the session service after a successful publish.
    #[serde(default)]
    pub cleanup_session_on_publish: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            session_prefix: default_session_prefix(),
            project_id: default_session_project(),
            worker_command: default_worker_command(),
            comment_footer: default_comment_footer(),
            cleanup_session_on_publish: false,
        }
    }
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_session_prefix() -> String {
    "claude-".to_string()
}

fn default_session_project() -> String {
    "ticket-automation".to_string()
}

fn default_worker_command() -> String {
    "cd {repo_path} && ./scripts/ticket-worker {ticket_id}".to_string()
}

fn default_comment_footer() -> String {
    "Completed with automated session assistance".to_string()
}

/// Where the external task runner drops completion artifacts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_dir")]
    pub dir: PathBuf,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            dir: default_completion_dir(),
        }
    }
}

fn default_completion_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

/// Which trigger types are admitted into the pending queue.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfig {
    #[serde(default = "default_true")]
    pub new_tickets: bool,
    #[serde(default = "default_true")]
    pub status_changes: bool,
    #[serde(default = "default_true")]
    pub comments: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            new_tickets: true,
            status_changes: true,
            comments: true,
        }
    }
}

impl TriggerConfig {
    /// Whether tickets with this trigger should be admitted.
    pub fn allows(&self, trigger: TriggerType) -> bool {
        match trigger {
            TriggerType::NewTicket => self.new_tickets,
            TriggerType::StatusChange => self.status_changes,
            TriggerType::CommentAdded => self.comments,
            TriggerType::Manual => true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub tracker: SanitizedTrackerConfig,
    pub session_service: SessionServiceConfig,
    pub automation: AutomationConfig,
    pub completion: CompletionConfig,
    pub scheduler: SchedulerConfig,
    pub triggers: TriggerConfig,
    pub server: ServerConfig,
}

/// Sanitized tracker config (API token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTrackerConfig {
    pub api_url: String,
    pub api_token_configured: bool,
    pub workspace_slug: String,
    pub project_identifier: String,
    pub project_ids: Vec<String>,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            tracker: SanitizedTrackerConfig {
                api_url: config.tracker.api_url.clone(),
                api_token_configured: !config.tracker.api_token.is_empty(),
                workspace_slug: config.tracker.workspace_slug.clone(),
                project_identifier: config.tracker.project_identifier.clone(),
                project_ids: config.tracker.project_ids.clone(),
                timeout_secs: config.tracker.timeout_secs,
                retry: config.tracker.retry.clone(),
            },
            session_service: config.session_service.clone(),
            automation: config.automation.clone(),
            completion: config.completion.clone(),
            scheduler: config.scheduler.clone(),
            triggers: config.triggers.clone(),
            server: config.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[tracker]
api_url = "https://plane.example.com/api/v1"
workspace_slug = "acme"
project_identifier = "OPS"
"#;

    #[test]
    fn test_deserialize_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.tracker.project_identifier, "OPS");
        assert!(config.tracker.project_ids.is_empty());
        assert_eq!(config.tracker.timeout_secs, 30);
        assert_eq!(config.tracker.retry.max_attempts, 3);
        assert_eq!(config.session_service.url, "http://localhost:5001");
        assert_eq!(config.automation.session_prefix, "claude-");
        assert_eq!(config.completion.dir, PathBuf::from("/tmp"));
        assert_eq!(config.scheduler.trigger_poll_interval_secs, 30);
        assert_eq!(config.scheduler.completion_poll_interval_secs, 5);
        assert!(config.triggers.new_tickets);
        assert_eq!(config.server.port, 5002);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_deserialize_missing_tracker_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_sections() {
        let toml = r#"
[tracker]
api_url = "https://plane.example.com/api/v1"
api_token = "secret"
workspace_slug = "acme"
project_identifier = "OPS"
project_ids = ["p-1", "p-2"]

[tracker.retry]
max_attempts = 5
initial_delay_ms = 100

[automation]
session_prefix = "work-"
cleanup_session_on_publish = true

[triggers]
comments = false

[scheduler]
trigger_poll_interval_secs = 60
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tracker.project_ids, vec!["p-1", "p-2"]);
        assert_eq!(config.tracker.retry.max_attempts, 5);
        assert_eq!(config.tracker.retry.initial_delay_ms, 100);
        assert_eq!(config.tracker.retry.max_delay_ms, 10_000);
        assert_eq!(config.automation.session_prefix, "work-");
        assert!(config.automation.cleanup_session_on_publish);
        assert!(!config.triggers.comments);
        assert!(config.triggers.status_changes);
        assert_eq!(config.scheduler.trigger_poll_interval_secs, 60);
        assert_eq!(config.scheduler.error_backoff_secs, 10);
    }

    #[test]
    fn test_trigger_filter() {
        let triggers = TriggerConfig {
            comments: false,
            ..TriggerConfig::default()
        };
        assert!(triggers.allows(TriggerType::NewTicket));
        assert!(!triggers.allows(TriggerType::CommentAdded));
        assert!(triggers.allows(TriggerType::Manual));
    }

    #[test]
    fn test_sanitized_config_hides_token() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.tracker.api_token = "super-secret".to_string();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.tracker.api_token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
