use super::auth::{AuthToken, AuthTokenValue, UserCredentials};
use super::models::{Profile, ProfilePatch};
use anyhow::Result;

pub trait UserCredentialsStore: Send + Sync {
    /// Returns the credentials for the given login handle.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_credentials(&self, handle: &str) -> Result<Option<UserCredentials>>;
}

pub trait AuthTokenStore: Send + Sync {
    /// Returns the auth token for the given value, or Ok(None) if unknown.
    fn get_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Adds a freshly generated auth token.
    fn add_auth_token(&self, token: AuthToken) -> Result<()>;

    /// Deletes a token; returns the deleted token, or Ok(None) if unknown.
    fn delete_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Stamps the token's last_used timestamp.
    fn touch_auth_token(&self, token: &AuthTokenValue) -> Result<()>;
}

pub trait UserStore: UserCredentialsStore + AuthTokenStore + Send + Sync {
    /// Creates a user with their profile and credentials, returning the new
    /// user id. Fails if the handle is already taken.
    fn create_user(&self, handle: &str, username: &str, password: &str) -> Result<usize>;

    /// Returns the profile for the user id, or Ok(None) if unknown.
    fn get_profile(&self, user_id: usize) -> Result<Option<Profile>>;

    /// Applies a partial profile update.
    fn update_profile(&self, user_id: usize, patch: &ProfilePatch) -> Result<()>;

    /// Returns ids of all registered profiles except the given user, i.e. the
    /// candidate set for recipient selection.
    fn profile_ids_except(&self, excluded_user_id: usize) -> Result<Vec<usize>>;

    /// Deletes the account; profile, credentials, tokens, letters and replies
    /// go with it (enforced by the schema's cascading foreign keys).
    fn delete_user(&self, user_id: usize) -> Result<()>;
}
