//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process with
//! a mock tracker and a mock session service injected, so every route can be
//! exercised without external infrastructure.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use conductor_core::testing::{MockSessionService, MockTracker};
use conductor_core::{
    load_config_from_str, CompletionWatcher, FsCompletionInbox, LifecycleEngine,
};

/// Re-export fixtures for test convenience
pub use conductor_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_add_ticket() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/tickets", json!({ "id": "OPS-1" })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock tracker - inspect comments and state updates
    pub tracker: Arc<MockTracker>,
    /// Mock session service - control session creation
    pub sessions: Arc<MockSessionService>,
    /// Engine behind the router, for seeding queues directly
    pub engine: Arc<LifecycleEngine>,
    /// Temporary completion directory
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = load_config_from_str(
            r#"
[tracker]
api_url = "http://plane.test/api/v1"
api_token = "secret-token"
workspace_slug = "acme"
project_identifier = "OPS"
project_ids = ["project-1"]
"#,
        )
        .expect("Failed to parse test config");

        let tracker = Arc::new(MockTracker::new());
        let sessions = Arc::new(MockSessionService::new());
        let engine = Arc::new(LifecycleEngine::new(
            config.automation.clone(),
            Arc::clone(&tracker) as Arc<dyn conductor_core::TicketTracker>,
            Arc::clone(&sessions) as Arc<dyn conductor_core::SessionService>,
        ));
        let watcher = Arc::new(CompletionWatcher::new(Arc::new(FsCompletionInbox::new(
            temp_dir.path(),
        ))));

        let state = Arc::new(conductor_server::state::AppState::new(
            config,
            Arc::clone(&engine),
            watcher,
        ));
        let router = conductor_server::api::create_router(state);

        Self {
            router,
            tracker,
            sessions,
            engine,
            temp_dir,
        }
    }

    /// Path where the task runner would drop the artifact for a ticket.
    pub fn completion_path(&self, ticket_id: &str) -> PathBuf {
        self.temp_dir
            .path()
            .join(format!("completion-{}.txt", ticket_id))
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Fetch the raw text of a response (for non-JSON endpoints).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
