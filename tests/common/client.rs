//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all comusic-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for testing authentication flows.
    /// For most tests, use `authenticated()` or `authenticated_receiver()`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client pre-authenticated as the seeded sender user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(TEST_USER, TEST_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test user authentication failed: {:?}",
            response.text().await
        );

        client
    }

    /// Creates a client pre-authenticated as the seeded receiver user
    pub async fn authenticated_receiver(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(RECEIVER_USER, RECEIVER_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Receiver authentication failed: {:?}",
            response.text().await
        );

        client
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/signup
    pub async fn signup(&self, handle: &str, username: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/signup", self.base_url))
            .json(&json!({
                "handle": handle,
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .expect("Signup request failed")
    }

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "handle": handle,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// DELETE /v1/auth/account
    pub async fn delete_account(&self) -> Response {
        self.client
            .delete(format!("{}/v1/auth/account", self.base_url))
            .send()
            .await
            .expect("Delete account request failed")
    }

    // ========================================================================
    // Profile Endpoints
    // ========================================================================

    /// GET /v1/profile
    pub async fn get_profile(&self) -> Response {
        self.client
            .get(format!("{}/v1/profile", self.base_url))
            .send()
            .await
            .expect("Get profile request failed")
    }

    /// PUT /v1/profile
    pub async fn put_profile(&self, patch: serde_json::Value) -> Response {
        self.client
            .put(format!("{}/v1/profile", self.base_url))
            .json(&patch)
            .send()
            .await
            .expect("Put profile request failed")
    }

    // ========================================================================
    // Letter Endpoints
    // ========================================================================

    /// POST /v1/letters with the standard test song
    pub async fn compose(&self, message: &str) -> Response {
        self.compose_with(json!({
            "provider": "spotify",
            "track_input": SPOTIFY_TRACK_URL,
            "title": TEST_SONG_TITLE,
            "message": message,
            "is_anonymous": false,
        }))
        .await
    }

    /// POST /v1/letters with an arbitrary body
    pub async fn compose_with(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/v1/letters", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Compose request failed")
    }

    /// GET /v1/letters/inbox
    pub async fn inbox(&self) -> Response {
        self.client
            .get(format!("{}/v1/letters/inbox", self.base_url))
            .send()
            .await
            .expect("Inbox request failed")
    }

    /// GET /v1/letters/sent
    pub async fn sent(&self) -> Response {
        self.client
            .get(format!("{}/v1/letters/sent", self.base_url))
            .send()
            .await
            .expect("Sent request failed")
    }

    /// GET /v1/letters/quota
    pub async fn quota(&self) -> Response {
        self.client
            .get(format!("{}/v1/letters/quota", self.base_url))
            .send()
            .await
            .expect("Quota request failed")
    }

    /// GET /v1/letters/{id}
    pub async fn letter(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/letters/{}", self.base_url, id))
            .send()
            .await
            .expect("Letter detail request failed")
    }

    /// POST /v1/letters/{id}/replies
    pub async fn reply(&self, id: &str, content: &str) -> Response {
        self.client
            .post(format!("{}/v1/letters/{}/replies", self.base_url, id))
            .json(&json!({ "content": content }))
            .send()
            .await
            .expect("Reply request failed")
    }

    /// POST /v1/letters/{id}/archive
    pub async fn archive(&self, id: &str) -> Response {
        self.client
            .post(format!("{}/v1/letters/{}/archive", self.base_url, id))
            .send()
            .await
            .expect("Archive request failed")
    }

    // ========================================================================
    // Settings Endpoints
    // ========================================================================

    /// GET /v1/settings
    pub async fn settings(&self) -> Response {
        self.client
            .get(format!("{}/v1/settings", self.base_url))
            .send()
            .await
            .expect("Settings request failed")
    }
}
