//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! over a real SQLite database in a temp dir, with a scripted fetcher
//! standing in for mirrors and media hosts.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediathek_core::{
    testing::MockFetcher, Config, DatabaseConfig, DownloadConfig, Downloader, QueryEngine,
    ResultWindow, SettingsStore, Show, SqliteDatabase, SqliteSettings, UpdateConfig,
    UpdateOrchestrator, ViewConfig,
};

/// Re-export fixtures for test convenience
pub use mediathek_core::testing::fixtures;

/// Mirror list URL used by every fixture.
pub const MIRROR_LIST_URL: &str = "http://mirrors.test/akt.xml";

/// The only mirror the fixture's stored mirror list knows.
pub const MIRROR_URL: &str = "http://mirror-a.test/Filmliste-akt.xz";

/// Test fixture for API testing.
///
/// Provides an in-process server with:
/// - SQLite show database and settings in a temp dir
/// - A controllable fetcher (MockFetcher) for catalog and download requests
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub state: Arc<mediathek_server::state::AppState>,
    pub fetcher: Arc<MockFetcher>,
    pub database: Arc<SqliteDatabase>,
    pub orchestrator: Arc<UpdateOrchestrator>,
    /// Temporary directory for the database and downloads
    pub temp_dir: TempDir,
    pub download_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture with an empty catalog.
    pub async fn new() -> Self {
        Self::with_shows(Vec::new()).await
    }

    /// Fixture whose catalog holds `shows`, with a fresh mirror list stored.
    pub async fn with_shows(shows: Vec<Show>) -> Self {
        Self::with_window_size(shows, 256).await
    }

    pub async fn with_window_size(shows: Vec<Show>, window_size: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let download_dir = temp_dir.path().join("downloads");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            update: UpdateConfig {
                enabled: false,
                mirror_list_url: MIRROR_LIST_URL.to_string(),
                ..Default::default()
            },
            view: ViewConfig {
                window_size,
                cache_capacity: 64,
            },
            download: DownloadConfig {
                directory: download_dir.clone(),
            },
            ..Default::default()
        };

        let database =
            Arc::new(SqliteDatabase::new(&db_path).expect("Failed to create show database"));
        if !shows.is_empty() {
            database
                .apply_update(&fixtures::catalog_payload(&shows))
                .expect("Failed to load catalog");
        }

        let settings =
            Arc::new(SqliteSettings::new(&db_path).expect("Failed to create settings store"));
        settings
            .set_mirror_list(&[MIRROR_URL.to_string()], Utc::now())
            .expect("Failed to store mirror list");

        let fetcher = Arc::new(MockFetcher::new());

        let window = ResultWindow::with_sizes(
            database.clone(),
            config.view.window_size,
            config.view.cache_capacity,
        )
        .expect("Failed to create result window");

        let orchestrator = Arc::new(UpdateOrchestrator::new(
            config.update.clone(),
            fetcher.clone(),
            settings.clone(),
            database.clone(),
        ));

        let state = Arc::new(mediathek_server::state::AppState::new(
            config,
            window,
            Arc::clone(&orchestrator),
            settings,
            Arc::new(Downloader::new(fetcher.clone())),
        ));

        mediathek_server::tasks::spawn_event_listener(Arc::clone(&state));

        // Create router
        let router = mediathek_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            fetcher,
            database,
            orchestrator,
            temp_dir,
            download_dir,
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

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the raw body text.
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
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).to_string())
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

/// `count` shows spread over ARD and ZDF.
pub fn sample_shows(count: usize) -> Vec<Show> {
    (0..count)
        .map(|i| {
            let channel = if i % 2 == 0 { "ARD" } else { "ZDF" };
            let mut show = fixtures::show(
                channel,
                &format!("Topic {}", i % 3),
                &format!("Episode {:04}", i),
            );
            show.url = format!("http://media.test/{}/{:04}.mp4", channel, i);
            show.url_small = Some(format!("http://media.test/{}/{:04}_small.mp4", channel, i));
            show
        })
        .collect()
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
