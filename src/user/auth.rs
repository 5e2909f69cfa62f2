//! Authentication primitives: password hashing and session tokens.

use anyhow::{bail, Result};
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::SystemTime;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AuthTokenValue(pub String);

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        AuthTokenValue(random_string)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AuthToken {
    pub user_id: usize,
    pub created: SystemTime,
    pub last_used: Option<SystemTime>,
    pub value: AuthTokenValue,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct UserCredentials {
    pub user_id: usize,
    pub hasher: PasswordHasher,
    pub salt: String,
    pub hash: String,
}

mod comusic_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    pub fn generate_b64_salt() -> String {
        SaltString::generate(&mut OsRng).to_string()
    }

    pub fn hash<T: AsRef<str>>(plain: &[u8], b64_salt: T) -> Result<String> {
        let argon2 = Argon2::default();
        let salt = SaltString::from_b64(b64_salt.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string())
    }

    pub fn verify<T: AsRef<str>>(plain: &[u8], target_hash: T) -> Result<bool> {
        let argon2 = Argon2::default();
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2.verify_password(plain, &password_hash).is_ok())
    }
}

/// Fast non-memory-hard hasher for tests only, gated behind the
/// `test-fast-hasher` feature.
#[cfg(feature = "test-fast-hasher")]
mod fast_sha2 {
    use sha2::{Digest, Sha256};

    pub fn hash(plain: &[u8], salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(plain);
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum PasswordHasher {
    Argon2,
    #[cfg(feature = "test-fast-hasher")]
    FastSha256,
}

impl PasswordHasher {
    /// The hasher new credentials are created with.
    pub fn preferred() -> Self {
        #[cfg(feature = "test-fast-hasher")]
        return PasswordHasher::FastSha256;
        #[cfg(not(feature = "test-fast-hasher"))]
        PasswordHasher::Argon2
    }

    pub fn generate_b64_salt(&self) -> String {
        comusic_argon2::generate_b64_salt()
    }

    pub fn hash<T: AsRef<str>>(&self, plain: &[u8], b64_salt: T) -> Result<String> {
        match self {
            PasswordHasher::Argon2 => comusic_argon2::hash(plain, b64_salt),
            #[cfg(feature = "test-fast-hasher")]
            PasswordHasher::FastSha256 => Ok(fast_sha2::hash(plain, b64_salt.as_ref())),
        }
    }

    pub fn verify<T: AsRef<str>>(&self, plain: T, target_hash: T, salt: T) -> Result<bool> {
        match self {
            PasswordHasher::Argon2 => {
                // argon2 hash strings embed their own salt
                let _ = &salt;
                comusic_argon2::verify(plain.as_ref().as_bytes(), target_hash)
            }
            #[cfg(feature = "test-fast-hasher")]
            PasswordHasher::FastSha256 => {
                Ok(fast_sha2::hash(plain.as_ref().as_bytes(), salt.as_ref())
                    == target_hash.as_ref())
            }
        }
    }
}

impl FromStr for PasswordHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(PasswordHasher::Argon2),
            #[cfg(feature = "test-fast-hasher")]
            "fast_sha256" => Ok(PasswordHasher::FastSha256),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl std::fmt::Display for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordHasher::Argon2 => write!(f, "argon2"),
            #[cfg(feature = "test-fast-hasher")]
            PasswordHasher::FastSha256 => write!(f, "fast_sha256"),
        }
    }
}

impl UserCredentials {
    /// Creates fresh credentials for a user with the preferred hasher.
    pub fn new(user_id: usize, password: &str) -> Result<Self> {
        let hasher = PasswordHasher::preferred();
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;
        Ok(Self {
            user_id,
            hasher,
            salt,
            hash,
        })
    }

    pub fn verify(&self, password: &str) -> Result<bool> {
        self.hasher
            .verify(password, self.hash.as_str(), self.salt.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_values_are_unique_and_long() {
        let a = AuthTokenValue::generate();
        let b = AuthTokenValue::generate();
        assert_eq!(a.0.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn credentials_verify_roundtrip() {
        let credentials = UserCredentials::new(1, "hunter2").unwrap();
        assert!(credentials.verify("hunter2").unwrap());
        assert!(!credentials.verify("hunter3").unwrap());
    }

    #[test]
    fn hasher_parses_own_display() {
        let hasher = PasswordHasher::preferred();
        let parsed: PasswordHasher = hasher.to_string().parse().unwrap();
        assert_eq!(parsed, hasher);
    }
}
