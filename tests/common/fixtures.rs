//! Test fixture creation for the comusic database

use super::constants::*;
use anyhow::Result;
use comusic_server::store::SqliteComusicStore;
use comusic_server::user::UserStore;
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a temporary database seeded with the two standard test users.
/// Returns the temp dir (keep it alive for the test duration) and the store.
pub fn create_test_db_with_users() -> Result<(TempDir, Arc<SqliteComusicStore>)> {
    let dir = TempDir::new()?;
    let store = Arc::new(SqliteComusicStore::new(dir.path().join("comusic.db"))?);

    store.create_user(TEST_USER, TEST_USERNAME, TEST_PASS)?;
    store.create_user(RECEIVER_USER, RECEIVER_USERNAME, RECEIVER_PASS)?;

    Ok((dir, store))
}
