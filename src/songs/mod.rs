mod models;
mod store;
mod track_id;

pub use models::{Artist, NewSong, Provider, Song};
pub use store::SongStore;
pub use track_id::extract_track_id;
