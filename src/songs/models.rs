use serde::{Deserialize, Serialize};

/// External music providers a song can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Spotify,
    Youtube,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Spotify => "spotify",
            Provider::Youtube => "youtube",
        }
    }

    pub fn parse(s: &str) -> Option<Provider> {
        match s {
            "spotify" => Some(Provider::Spotify),
            "youtube" => Some(Provider::Youtube),
            _ => None,
        }
    }

    /// Canonical public URL for a track id on this provider.
    pub fn track_url(&self, track_id: &str) -> String {
        match self {
            Provider::Spotify => format!("https://open.spotify.com/track/{}", track_id),
            Provider::Youtube => format!("https://youtu.be/{}", track_id),
        }
    }
}

/// A track, deduplicated by `(provider, provider_track_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub provider: Provider,
    pub provider_track_id: String,
    pub title: String,
    /// Display string of artist names, e.g. "A, B".
    pub artist_names: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Song fields known at compose time; the id is assigned on upsert.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub provider: Provider,
    pub provider_track_id: String,
    pub title: String,
    pub artist_names: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_ms: Option<i64>,
}

/// An artist, deduplicated by `(provider, provider_artist_id)` and linked to
/// songs through the `songs_artists` join table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub provider: Provider,
    pub provider_artist_id: String,
}
