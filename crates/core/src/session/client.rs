//! HTTP client for the session service.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::SessionServiceConfig;
use crate::retry::{classify_transport_error, retry_call, AttemptError, RetryError};

use super::types::{SessionEnvelope, SessionError, SessionInfo, SessionList, SessionService};

/// Session service client.
pub struct SessionServiceClient {
    config: SessionServiceConfig,
    client: Mutex<Option<Client>>,
}

impl SessionServiceClient {
    pub fn new(config: SessionServiceConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn session_url(&self, session_id: &str) -> String {
        format!(
            "{}/sessions/{}",
            self.base_url(),
            urlencoding::encode(session_id)
        )
    }

    fn http(&self) -> Result<Client, SessionError> {
        let mut guard = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| SessionError::Internal(format!("failed to build HTTP client: {}", e)))?;

        *guard = Some(client.clone());
        Ok(client)
    }
}

fn transport_error(e: reqwest::Error) -> SessionError {
    SessionError::Transient(e.to_string())
}

async fn status_error(response: reqwest::Response) -> SessionError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        SessionError::Transient(format!("HTTP {}: {}", status.as_u16(), message))
    } else {
        SessionError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// Outcome of one upsert attempt that reached the service.
enum Upsert {
    Created(Option<SessionInfo>),
    Rejected { status: u16, message: String },
}

#[async_trait]
impl SessionService for SessionServiceClient {
    fn name(&self) -> &str {
        "session-service"
    }

    async fn create_session(
        &self,
        session_id: &str,
        project_id: &str,
        command: &str,
    ) -> Result<SessionInfo, SessionError> {
        let client = self.http()?;
        let url = self.session_url(session_id);
        let body = json!({ "projectId": project_id, "command": command });

        let result = retry_call(&self.config.retry, "create_session", |_attempt| {
            let request = client.put(url.as_str()).json(&body);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| classify_transport_error(&e))?;

                let status = response.status();
                if status.is_success() {
                    // Any 2xx means the session exists.
                    let bytes = response.bytes().await.unwrap_or_default();
                    let envelope: SessionEnvelope = serde_json::from_slice(&bytes)
                        .unwrap_or_else(|e| {
                            warn!("Unexpected session service response body: {}", e);
                            SessionEnvelope::default()
                        });
                    return Ok(Upsert::Created(envelope.session));
                }

                let message = response.text().await.unwrap_or_default();
                if status.is_server_error() {
                    return Err(AttemptError::Transient(format!(
                        "HTTP {}: {}",
                        status.as_u16(),
                        message
                    )));
                }
                Ok(Upsert::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        })
        .await;

        match result {
            Ok(Upsert::Created(info)) => {
                info!("Created/ensured session: {}", session_id);
                Ok(info.unwrap_or_else(|| SessionInfo {
                    session_id: session_id.to_string(),
                    project_id: Some(project_id.to_string()),
                    command: Some(command.to_string()),
                    created_at: None,
                }))
            }
            Ok(Upsert::Rejected { status, message }) => {
                error!(
                    "Session service rejected session {} (HTTP {}): {}",
                    session_id, status, message
                );
                Err(SessionError::Rejected { status, message })
            }
            Err(RetryError::Exhausted { last_error, .. }) => {
                error!("Failed to create session {}: {}", session_id, last_error);
                Err(SessionError::Transient(last_error))
            }
            Err(RetryError::Fatal { reason, .. }) => Err(SessionError::Decode(reason)),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        let client = self.http()?;
        let url = format!("{}/sessions", self.base_url());
        let response = client.get(&url).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let list: SessionList = response
            .json()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))?;
        Ok(list.sessions)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        let client = self.http()?;
        let response = client
            .delete(self.session_url(session_id))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        info!("Deleted session: {}", session_id);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let client = match self.http() {
            Ok(client) => client,
            Err(_) => return false,
        };
        let url = format!("{}/health", self.base_url());
        match client.get(&url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("Session service health check failed: {}", e);
                false
            }
        }
    }

    async fn close(&self) {
        let previous = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            debug!("Closed session service HTTP client");
        }
    }
}
