mod schema;
mod sqlite_store;

use crate::letters::LetterStore;
use crate::settings::SettingsStore;
use crate::songs::SongStore;
use crate::user::UserStore;

pub use schema::VERSIONED_SCHEMAS;
pub use sqlite_store::SqliteComusicStore;

/// Everything the server needs from persistence, as one object-safe bundle.
pub trait ComusicStore: UserStore + SongStore + LetterStore + SettingsStore {
    /// Upcast for callers that take the letter store trait alone.
    fn as_letter_store(&self) -> &dyn LetterStore;
}

impl<T: UserStore + SongStore + LetterStore + SettingsStore + Sized> ComusicStore for T {
    fn as_letter_store(&self) -> &dyn LetterStore {
        self
    }
}
