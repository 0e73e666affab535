//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a coordinator wired to mock transport and transcoder, enabling
//! end-to-end API tests without ffmpeg or a messaging service.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vidrelay_core::{
    load_config_from_str,
    testing::{MockTranscoder, MockTransport},
    ArtifactCache, PipelineCoordinator, RateLimiter, SqliteArtifactCache, SubmissionService,
};
use vidrelay_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use vidrelay_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/submissions", json!({
///         "submitter": "alice",
///         "source": "alice/clip.mkv",
///         "file_name": "clip.mkv"
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Coordinator behind the router
    pub coordinator: PipelineCoordinator<MockTransport, MockTranscoder>,
    /// Mock transport - control transfers and inspect notices
    pub transport: Arc<MockTransport>,
    /// Mock transcoder
    pub transcoder: Arc<MockTranscoder>,
    /// Artifact cache shared with the coordinator
    pub cache: Arc<SqliteArtifactCache>,
    /// Temporary directory for work files and the cache
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture that admits every submitter.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let allowed = test_config
            .allowed_submitters
            .iter()
            .map(|s| format!("{:?}", s))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!(
            r#"
[broadcast]
destination = "archive"

[paths]
work_dir = {work_dir:?}

[access]
allowed_submitters = [{allowed}]
{admin_key}

[rate_limit]
direct_interval_ms = 1

[queue]
poll_interval_ms = 50
notice_retract_delay_ms = 10
"#,
            work_dir = temp_dir.path().join("work").display().to_string(),
            admin_key = test_config
                .admin_api_key
                .as_ref()
                .map(|key| format!("admin_api_key = {:?}", key))
                .unwrap_or_default(),
        );
        let config = load_config_from_str(&toml).expect("Invalid test config");

        let transport = Arc::new(MockTransport::new());
        let transcoder = Arc::new(MockTranscoder::new());
        let cache = Arc::new(
            SqliteArtifactCache::new(&temp_dir.path().join("cache.db"))
                .expect("Failed to create cache"),
        );

        let coordinator = PipelineCoordinator::new(
            config.coordinator_config(),
            Arc::clone(&transport),
            Arc::clone(&transcoder),
            Arc::clone(&cache) as Arc<dyn ArtifactCache>,
        )
        .with_rate_limiter(Arc::new(RateLimiter::new(config.rate_limit.clone())));

        let service: Arc<dyn SubmissionService> = Arc::new(coordinator.clone());
        let state = Arc::new(AppState::new(config, service));
        let router = create_router(state);

        Self {
            router,
            coordinator,
            transport,
            transcoder,
            cache,
            temp_dir,
        }
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

    /// Send a GET request and return the raw body as text.
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
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request carrying an admin key in `X-API-Key`.
    pub async fn with_key(&self, method: &str, path: &str, key: &str) -> TestResponse {
        self.send(method, path, None, Some(key)).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        self.send(method, path, body, None).await
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        api_key: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(key) = api_key {
            request_builder = request_builder.header("X-API-Key", key);
        }

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

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Submitters allowed to submit (empty admits everyone)
    pub allowed_submitters: Vec<String>,
    /// Key for the allow list endpoints (unset disables them)
    pub admin_api_key: Option<String>,
}

impl TestConfig {
    /// Create config that only admits the given submitters.
    pub fn with_allowed(submitters: &[&str]) -> Self {
        Self {
            allowed_submitters: submitters.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Enable allow list management with the given key.
    pub fn with_admin_key(mut self, key: &str) -> Self {
        self.admin_api_key = Some(key.to_string());
        self
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
