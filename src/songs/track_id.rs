//! Provider track-id extraction from user-pasted input.
//!
//! Compose accepts either a bare track/video id or a share URL; the natural
//! key stored in `songs` is always the bare id.

use super::models::Provider;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPOTIFY_TRACK_RE: Regex =
        Regex::new(r"spotify\.com/(?:intl-[a-z]+/)?track/([a-zA-Z0-9]+)").unwrap();
    static ref YOUTUBE_WATCH_RE: Regex =
        Regex::new(r"youtube\.com/watch\?(?:[^#\s]*&)?v=([a-zA-Z0-9_-]+)").unwrap();
    static ref YOUTUBE_SHORT_RE: Regex = Regex::new(r"youtu\.be/([a-zA-Z0-9_-]+)").unwrap();
}

/// Extracts the provider-native track id from a pasted URL or bare id.
/// Returns None for empty input; unrecognized non-empty input is passed
/// through as a bare id.
pub fn extract_track_id(provider: Provider, input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let captured = match provider {
        Provider::Spotify => SPOTIFY_TRACK_RE
            .captures(trimmed)
            .map(|c| c[1].to_string()),
        Provider::Youtube => YOUTUBE_WATCH_RE
            .captures(trimmed)
            .or_else(|| YOUTUBE_SHORT_RE.captures(trimmed))
            .map(|c| c[1].to_string()),
    };

    Some(captured.unwrap_or_else(|| trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotify_share_url() {
        assert_eq!(
            extract_track_id(
                Provider::Spotify,
                "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"
            ),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
    }

    #[test]
    fn spotify_intl_url() {
        assert_eq!(
            extract_track_id(
                Provider::Spotify,
                "https://open.spotify.com/intl-ja/track/0gplL1WMoJ6iYaPgMCL0gX"
            ),
            Some("0gplL1WMoJ6iYaPgMCL0gX".to_string())
        );
    }

    #[test]
    fn spotify_bare_id_passthrough() {
        assert_eq!(
            extract_track_id(Provider::Spotify, " 4uLU6hMCjMI75M1A2tKUQC "),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
    }

    #[test]
    fn youtube_watch_url() {
        assert_eq!(
            extract_track_id(
                Provider::Youtube,
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
            ),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn youtube_watch_url_with_leading_params() {
        assert_eq!(
            extract_track_id(
                Provider::Youtube,
                "https://www.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ&t=42"
            ),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn youtube_short_url() {
        assert_eq!(
            extract_track_id(Provider::Youtube, "https://youtu.be/dQw4w9WgXcQ?t=10"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn empty_input_rejected() {
        assert_eq!(extract_track_id(Provider::Spotify, "   "), None);
        assert_eq!(extract_track_id(Provider::Youtube, ""), None);
    }
}
