//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (user credentials, track ids, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Seeded sender handle
pub const TEST_USER: &str = "testuser";

/// Seeded sender password
pub const TEST_PASS: &str = "testpass123";

/// Seeded sender display name
pub const TEST_USERNAME: &str = "Test User";

/// Seeded receiver handle
pub const RECEIVER_USER: &str = "receiver";

/// Seeded receiver password
pub const RECEIVER_PASS: &str = "receiverpass123";

/// Seeded receiver display name
pub const RECEIVER_USERNAME: &str = "Receiver";

// ============================================================================
// Test Track Data
// ============================================================================

/// A Spotify share URL whose track id is `4uLU6hMCjMI75M1A2tKUQC`
pub const SPOTIFY_TRACK_URL: &str =
    "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc123";

/// The track id embedded in [`SPOTIFY_TRACK_URL`]
pub const SPOTIFY_TRACK_ID: &str = "4uLU6hMCjMI75M1A2tKUQC";

/// A YouTube share URL whose video id is `dQw4w9WgXcQ`
pub const YOUTUBE_TRACK_URL: &str = "https://youtu.be/dQw4w9WgXcQ";

/// Default song title used by the test client
pub const TEST_SONG_TITLE: &str = "Never Gonna Give You Up";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
