use serde::{Deserialize, Serialize};

/// A user's public profile. Created at signup, mutated via settings,
/// deleted together with the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: usize,
    /// Display name shown on non-anonymous letters.
    pub username: String,
    /// Unique login handle.
    pub handle: String,
    pub has_seen_tutorial: bool,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub has_seen_tutorial: Option<bool>,
}
