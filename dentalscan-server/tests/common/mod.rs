//! Common test utilities for backend integration tests

use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dentalscan_core::{EmailTemplate, MockAnalyzer};
use dentalscan_server::routes::{self, IDENTITY_SECRET_HEADER, SESSION_COOKIE};
use dentalscan_server::{AppState, EmailSender, InMemoryBlobStore, InMemoryStore, Settings};
use serde_json::{json, Value};

/// External identity configured as the owner (admin) in tests
pub const OWNER_OPEN_ID: &str = "owner-open-id";

pub const PUBLIC_URL: &str = "http://localhost:3000";

/// Shared secret the test identity provider signs in with
pub const IDENTITY_SECRET: &str = "test-identity-secret";

pub type TestState = Arc<AppState<InMemoryStore, InMemoryBlobStore, MockEmailSender>>;

/// Mock email sender that captures outgoing messages
#[derive(Default, Clone)]
pub struct MockEmailSender {
    /// Captured (recipient, subject) pairs
    pub sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subjects of every email sent to `to`, oldest first
    pub fn subjects_for(&self, to: &str) -> Vec<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| recipient == to)
            .map(|(_, subject)| subject.clone())
            .collect()
    }
}

impl EmailSender for MockEmailSender {
    fn send(&self, to: &str, email: &EmailTemplate) -> Result<(), String> {
        self.sent
            .write()
            .unwrap()
            .push((to.to_string(), email.subject.clone()));
        Ok(())
    }
}

/// Create a test server backed by in-memory stores and an instant analyzer
pub fn create_test_server() -> (TestServer, TestState) {
    create_test_server_with(MockAnalyzer::instant())
}

pub fn create_test_server_with(analyzer: MockAnalyzer) -> (TestServer, TestState) {
    let state = Arc::new(AppState::new(
        InMemoryStore::new(),
        InMemoryBlobStore::new(format!("{}/files", PUBLIC_URL)),
        MockEmailSender::new(),
        analyzer,
        Settings {
            owner_open_id: Some(OWNER_OPEN_ID.to_string()),
            public_url: PUBLIC_URL.to_string(),
            identity_secret: Some(IDENTITY_SECRET.to_string()),
        },
    ));

    let app = routes::create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, state)
}

/// Header the identity provider authenticates its callback with
pub fn identity_header(secret: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(IDENTITY_SECRET_HEADER),
        HeaderValue::from_static(secret),
    )
}

pub fn session(value: &str) -> cookie::Cookie<'static> {
    cookie::Cookie::new(SESSION_COOKIE, value.to_string())
}

/// Sign in through the identity callback and return the session cookie value
pub async fn sign_in(server: &TestServer, open_id: &str, email: Option<&str>) -> String {
    let (name, value) = identity_header(IDENTITY_SECRET);
    let response = server
        .post("/api/auth.signIn")
        .add_header(name, value)
        .json(&json!({
            "openId": open_id,
            "name": format!("User {}", open_id),
            "email": email,
            "loginMethod": "oauth",
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    response
        .maybe_cookie(SESSION_COOKIE)
        .expect("No session cookie")
        .value()
        .to_string()
}

pub async fn sign_in_admin(server: &TestServer) -> String {
    sign_in(server, OWNER_OPEN_ID, Some("owner@example.edu")).await
}

/// Base64 payload of `len` bytes of fake image data
pub fn image_base64(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    for (byte, marker) in bytes.iter_mut().zip([0xFF, 0xD8, 0xFF, 0xE0]) {
        *byte = marker;
    }
    STANDARD.encode(bytes)
}

/// Upload a small JPEG and return the new submission id
pub async fn upload(server: &TestServer, cookie: &str) -> u64 {
    let response = server
        .post("/api/submission.upload")
        .add_cookie(session(cookie))
        .json(&json!({
            "fileName": "teeth.jpg",
            "fileSize": 1024,
            "mimeType": "image/jpeg",
            "imageBase64": image_base64(1024),
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    body["submissionId"].as_u64().expect("No submission id")
}

/// Poll `submission.getDetails` until the submission leaves `analyzing`
pub async fn wait_for_analysis(server: &TestServer, cookie: &str, submission_id: u64) -> Value {
    for _ in 0..100 {
        let response = server
            .get("/api/submission.getDetails")
            .add_query_param("submissionId", submission_id)
            .add_cookie(session(cookie))
            .await;
        let body: Value = response.json();
        if body["submission"]["status"] != "analyzing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("analysis of submission {} did not finish", submission_id);
}
