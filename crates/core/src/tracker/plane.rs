//! Plane REST API client.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::lifecycle::{Ticket, TriggerType};
use crate::metrics::TRACKER_API_CALLS;
use crate::retry::{classify_transport_error, retry_call, AttemptError, RetryError};

use super::snapshot::PollSnapshot;
use super::types::{
    Listing, TicketTracker, TrackerComment, TrackerError, TrackerIssue, WorkflowState,
    WriteOutcome,
};

/// Page size requested from list endpoints.
const PAGE_SIZE: usize = 100;
/// Hard cap on pages fetched per listing.
const MAX_PAGES: usize = 50;

/// Plane tracker client.
///
/// Holds the poll snapshot used for trigger detection, so a single instance
/// should be shared for the lifetime of the process.
pub struct PlaneTrackerClient {
    config: TrackerConfig,
    /// Created on first use, dropped by `close()`.
    client: Mutex<Option<Client>>,
    snapshot: Mutex<PollSnapshot>,
}

impl PlaneTrackerClient {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            snapshot: Mutex::new(PollSnapshot::new()),
        }
    }

    /// Number of issues currently remembered by the trigger diff.
    pub fn snapshot_len(&self) -> usize {
        self.lock_snapshot().len()
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, PollSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn http(&self) -> Result<Client, TrackerError> {
        let mut guard = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&self.config.api_token)
            .map_err(|e| TrackerError::Internal(format!("invalid API token: {}", e)))?;
        headers.insert("X-Api-Key", api_key);

        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| TrackerError::Internal(format!("failed to build HTTP client: {}", e)))?;

        *guard = Some(client.clone());
        Ok(client)
    }

    fn project_url(&self, project_id: &str) -> String {
        format!(
            "{}/workspaces/{}/projects/{}",
            self.config.api_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.workspace_slug),
            urlencoding::encode(project_id)
        )
    }

    fn issue_url(&self, project_id: &str, issue_uuid: &str) -> String {
        format!(
            "{}/issues/{}",
            self.project_url(project_id),
            urlencoding::encode(issue_uuid)
        )
    }

    /// Single-attempt GET decoding a JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
    ) -> Result<T, TrackerError> {
        let client = self.http()?;
        let response = client.get(url).send().await.map_err(|e| {
            TRACKER_API_CALLS.with_label_values(&[operation, "error"]).inc();
            TrackerError::Transient {
                operation: operation.to_string(),
                attempts: 1,
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            TRACKER_API_CALLS.with_label_values(&[operation, "error"]).inc();
            let message = response.text().await.unwrap_or_default();
            return Err(TrackerError::Http {
                operation: operation.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        TRACKER_API_CALLS.with_label_values(&[operation, "success"]).inc();
        response
            .json::<T>()
            .await
            .map_err(|e| TrackerError::Decode(format!("{}: {}", operation, e)))
    }

    /// Follow cursor pagination. The flag is false when the page cap cut the listing short.
    async fn list_all<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
    ) -> Result<(Vec<T>, bool), TrackerError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page_url = match &cursor {
                None => format!("{}?per_page={}", url, PAGE_SIZE),
                Some(c) => format!(
                    "{}?per_page={}&cursor={}",
                    url,
                    PAGE_SIZE,
                    urlencoding::encode(c)
                ),
            };

            match self.get_json::<Listing<T>>(operation, &page_url).await? {
                Listing::Bare(results) => {
                    items.extend(results);
                    return Ok((items, true));
                }
                Listing::Paged(page) => {
                    items.extend(page.results);
                    match page.next_cursor {
                        Some(next) if page.next_page_results => cursor = Some(next),
                        _ => return Ok((items, true)),
                    }
                }
            }
        }

        warn!(
            "{} stopped after {} pages, listing is incomplete",
            operation, MAX_PAGES
        );
        Ok((items, false))
    }

    /// Write with retries. 5xx and transport failures are retried, 4xx is final.
    async fn send_write(
        &self,
        operation: &str,
        method: reqwest::Method,
        url: String,
        body: serde_json::Value,
    ) -> Result<WriteOutcome, TrackerError> {
        let client = self.http()?;

        let result = retry_call(&self.config.retry, operation, |_attempt| {
            let request = client.request(method.clone(), url.as_str()).json(&body);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| classify_transport_error(&e))?;

                let status = response.status();
                if status.is_success() {
                    return Ok(WriteOutcome::Applied);
                }

                let message = response.text().await.unwrap_or_default();
                if status.is_server_error() {
                    return Err(AttemptError::Transient(format!(
                        "HTTP {}: {}",
                        status.as_u16(),
                        message
                    )));
                }

                Ok(WriteOutcome::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        })
        .await;

        match result {
            Ok(WriteOutcome::Applied) => {
                TRACKER_API_CALLS.with_label_values(&[operation, "success"]).inc();
                Ok(WriteOutcome::Applied)
            }
            Ok(WriteOutcome::Rejected { status, message }) => {
                TRACKER_API_CALLS.with_label_values(&[operation, "rejected"]).inc();
                error!("{} rejected with HTTP {}: {}", operation, status, message);
                Ok(WriteOutcome::Rejected { status, message })
            }
            Err(RetryError::Exhausted {
                attempts,
                last_error,
                ..
            }) => {
                TRACKER_API_CALLS.with_label_values(&[operation, "error"]).inc();
                error!(
                    "{} failed after {} attempt(s): {}",
                    operation, attempts, last_error
                );
                Err(TrackerError::Transient {
                    operation: operation.to_string(),
                    attempts,
                    reason: last_error,
                })
            }
            Err(RetryError::Fatal { reason, .. }) => {
                TRACKER_API_CALLS.with_label_values(&[operation, "error"]).inc();
                Err(TrackerError::Internal(reason))
            }
        }
    }

    async fn poll_project(&self, project_id: &str) -> Result<Vec<Ticket>, TrackerError> {
        let url = format!("{}/issues/", self.project_url(project_id));
        let (issues, complete) = self.list_all::<TrackerIssue>("list_issues", &url).await?;
        debug!("Found {} issue(s) in project {}", issues.len(), project_id);

        let readable: Vec<(String, &TrackerIssue)> = issues
            .iter()
            .filter_map(|issue| {
                issue
                    .sequence_id
                    .filter(|seq| *seq > 0)
                    .map(|seq| (format!("{}-{}", self.config.project_identifier, seq), issue))
            })
            .collect();

        // Only first sightings need a group, so states are fetched at most once
        // and only when one of those lacks an inline group.
        let needs_groups = {
            let snapshot = self.lock_snapshot();
            readable
                .iter()
                .any(|(id, issue)| issue.inline_group().is_none() && !snapshot.contains(id))
        };
        let groups: HashMap<String, String> = if needs_groups {
            match self.list_states(project_id).await {
                Ok(states) => states.into_iter().map(|s| (s.id, s.group)).collect(),
                Err(e) => {
                    warn!("Could not resolve state groups for project {}: {}", project_id, e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let mut triggered = Vec::new();
        let mut snapshot = self.lock_snapshot();

        for (id, issue) in &readable {
            let group = issue
                .inline_group()
                .map(str::to_string)
                .or_else(|| issue.state.as_ref().and_then(|s| groups.get(s).cloned()));

            if let Some(trigger) = snapshot.classify(
                id,
                project_id,
                issue.state.as_deref(),
                group.as_deref(),
                issue.updated_at.as_deref(),
            ) {
                debug!("Ticket {} triggered: {}", id, trigger);
                triggered.push(to_ticket(id, project_id, issue, group, trigger));
            }
        }

        if complete {
            let seen: HashSet<String> = readable.iter().map(|(id, _)| id.clone()).collect();
            let pruned = snapshot.prune_project(project_id, &seen);
            if pruned > 0 {
                debug!("Pruned {} vanished issue(s) of project {}", pruned, project_id);
            }
        }

        Ok(triggered)
    }
}

fn to_ticket(
    id: &str,
    project_id: &str,
    issue: &TrackerIssue,
    state_group: Option<String>,
    trigger_type: TriggerType,
) -> Ticket {
    Ticket {
        uuid: issue.id.clone(),
        project_id: project_id.to_string(),
        title: issue.name.clone(),
        description: issue.description_html.clone().unwrap_or_default(),
        state: issue.state.clone().unwrap_or_default(),
        state_group,
        priority: issue.priority.clone(),
        created_at: issue.created_at.clone(),
        updated_at: issue.updated_at.clone(),
        admitted_at: Utc::now(),
        ..Ticket::new(id, trigger_type)
    }
}

#[async_trait]
impl TicketTracker for PlaneTrackerClient {
    fn name(&self) -> &str {
        "plane"
    }

    async fn poll(&self) -> Result<Vec<Ticket>, TrackerError> {
        debug!(
            "Polling tracker for triggers across {} project(s)",
            self.config.project_ids.len()
        );

        let mut triggered = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for project_id in &self.config.project_ids {
            match self.poll_project(project_id).await {
                Ok(tickets) => triggered.extend(tickets),
                Err(e) => {
                    error!("Failed to list issues for project {}: {}", project_id, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            if failures == self.config.project_ids.len() {
                return Err(e);
            }
        }

        info!("Poll complete: {} triggered ticket(s)", triggered.len());
        Ok(triggered)
    }

    async fn add_comment(
        &self,
        project_id: &str,
        issue_uuid: &str,
        comment_html: &str,
    ) -> Result<WriteOutcome, TrackerError> {
        let url = format!("{}/comments/", self.issue_url(project_id, issue_uuid));
        let outcome = self
            .send_write(
                "add_comment",
                reqwest::Method::POST,
                url,
                json!({ "comment_html": comment_html }),
            )
            .await?;
        if outcome.is_applied() {
            info!("Added comment to issue {}", issue_uuid);
        }
        Ok(outcome)
    }

    async fn update_state(
        &self,
        project_id: &str,
        issue_uuid: &str,
        state_id: &str,
    ) -> Result<WriteOutcome, TrackerError> {
        let url = format!("{}/", self.issue_url(project_id, issue_uuid));
        let outcome = self
            .send_write(
                "update_state",
                reqwest::Method::PATCH,
                url,
                json!({ "state": state_id }),
            )
            .await?;
        if outcome.is_applied() {
            info!("Updated state of issue {} to {}", issue_uuid, state_id);
        }
        Ok(outcome)
    }

    async fn list_states(&self, project_id: &str) -> Result<Vec<WorkflowState>, TrackerError> {
        let url = format!("{}/states/", self.project_url(project_id));
        let (states, _) = self.list_all("list_states", &url).await?;
        Ok(states)
    }

    async fn list_comments(
        &self,
        project_id: &str,
        issue_uuid: &str,
    ) -> Result<Vec<TrackerComment>, TrackerError> {
        let url = format!("{}/comments/", self.issue_url(project_id, issue_uuid));
        let (comments, _) = self.list_all("list_comments", &url).await?;
        Ok(comments)
    }

    async fn close(&self) {
        let previous = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            debug!("Closed tracker HTTP client");
        }
    }
}
