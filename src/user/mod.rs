pub mod auth;
mod models;
mod store;

pub use auth::{AuthToken, AuthTokenValue, PasswordHasher, UserCredentials};
pub use models::{Profile, ProfilePatch};
pub use store::{AuthTokenStore, UserCredentialsStore, UserStore};
