//! Comusic server library.
//!
//! Exposes the internal modules for testing and potential reuse.

pub mod letters;
pub mod server;
pub mod settings;
pub mod songs;
pub mod sqlite_persistence;
pub mod store;
pub mod user;

// Re-export commonly used types for convenience
pub use letters::{DeliveryService, SelectionPolicyKind};
pub use server::{run_server, RequestsLoggingLevel};
pub use store::{ComusicStore, SqliteComusicStore};
