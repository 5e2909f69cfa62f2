use super::models::{Artist, NewSong, Provider, Song};
use anyhow::Result;

pub trait SongStore: Send + Sync {
    /// Inserts the song or returns the existing row for the same
    /// `(provider, provider_track_id)` natural key. Never duplicates.
    fn upsert_song(&self, song: &NewSong) -> Result<Song>;

    /// Returns a song by id, or Ok(None) if unknown.
    fn get_song(&self, song_id: &str) -> Result<Option<Song>>;

    /// Inserts the artist or returns the existing row for the same
    /// `(provider, provider_artist_id)` natural key.
    fn upsert_artist(&self, name: &str, provider: Provider, provider_artist_id: &str)
        -> Result<Artist>;

    /// Links a song to an artist; linking twice is a no-op.
    fn link_song_artist(&self, song_id: &str, artist_id: &str) -> Result<()>;

    /// Returns the artists linked to a song.
    fn get_song_artists(&self, song_id: &str) -> Result<Vec<Artist>>;
}
