//! Password hashing behind a trait so tests can swap in a cheap stub.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::Argon2;

use crate::error::{AuthError, Result};

/// Hashes and verifies login passwords. Verification failures are
/// reported as `false`, not as errors; a malformed stored hash is the
/// only hard failure.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id with the library's default parameters, salted per hash.
#[derive(Default)]
pub struct Argon2Hasher {
    inner: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2::PasswordHasher::hash_password(&self.inner, password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("stored password hash is malformed: {e}")))?;
        match argon2::PasswordVerifier::verify_password(&self.inner, password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Internal(format!("password verification failed: {e}"))),
        }
    }
}
