//! Mock session service for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::session::{SessionError, SessionInfo, SessionService};

/// A recorded create_session call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSession {
    pub session_id: String,
    pub project_id: String,
    pub command: String,
}

/// Mock implementation of the SessionService trait.
///
/// Provides controllable behavior for testing:
/// - Track created and deleted sessions for assertions
/// - Inject a one-shot error for the next call
/// - Delay session creation to exercise concurrent callers
#[derive(Debug)]
pub struct MockSessionService {
    created: Arc<RwLock<Vec<RecordedSession>>>,
    deleted: Arc<RwLock<Vec<String>>>,
    sessions: Arc<RwLock<HashMap<String, SessionInfo>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<SessionError>>>,
    create_delay: Arc<RwLock<Option<Duration>>>,
    healthy: Arc<RwLock<bool>>,
    closed: Arc<RwLock<bool>>,
}

impl Default for MockSessionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionService {
    pub fn new() -> Self {
        Self {
            created: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            create_delay: Arc::new(RwLock::new(None)),
            healthy: Arc::new(RwLock::new(true)),
            closed: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn created_sessions(&self) -> Vec<RecordedSession> {
        self.created.read().await.clone()
    }

    pub async fn deleted_sessions(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: SessionError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.write().await = Some(delay);
    }

    pub async fn set_healthy(&self, healthy: bool) {
        *self.healthy.write().await = healthy;
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }

    async fn take_error(&self) -> Option<SessionError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl SessionService for MockSessionService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_session(
        &self,
        session_id: &str,
        project_id: &str,
        command: &str,
    ) -> Result<SessionInfo, SessionError> {
        let delay = *self.create_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.created.write().await.push(RecordedSession {
            session_id: session_id.to_string(),
            project_id: project_id.to_string(),
            command: command.to_string(),
        });

        let info = SessionInfo {
            session_id: session_id.to_string(),
            project_id: Some(project_id.to_string()),
            command: Some(command.to_string()),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), info.clone());
        Ok(info)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let mut sessions: Vec<SessionInfo> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if self.sessions.write().await.remove(session_id).is_none() {
            return Err(SessionError::Rejected {
                status: 404,
                message: format!("session {} not found", session_id),
            });
        }
        self.deleted.write().await.push(session_id.to_string());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        *self.healthy.read().await
    }

    async fn close(&self) {
        *self.closed.write().await = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_list_delete() {
        let service = MockSessionService::new();
        service.create_session("s1", "p", "echo hi").await.unwrap();

        assert!(service.session_exists("s1").await.unwrap());
        assert_eq!(service.list_sessions().await.unwrap().len(), 1);

        service.delete_session("s1").await.unwrap();
        assert!(!service.session_exists("s1").await.unwrap());
        assert_eq!(service.deleted_sessions().await, vec!["s1".to_string()]);
        assert!(service.delete_session("s1").await.is_err());
    }

    #[tokio::test]
    async fn test_next_error_is_one_shot() {
        let service = MockSessionService::new();
        service
            .set_next_error(SessionError::Transient("refused".to_string()))
            .await;

        assert!(service.create_session("s1", "p", "echo").await.is_err());
        assert!(service.create_session("s1", "p", "echo").await.is_ok());
        assert_eq!(service.created_sessions().await.len(), 1);
    }
}
