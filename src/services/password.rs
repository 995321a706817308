//! Salted one-way password hashing.
//!
//! The digest input is the plaintext immediately followed by the per-user salt.
//! That ordering is part of the storage format: stored hashes only verify if
//! it is preserved exactly. Argon2id additionally mixes in its own random PHC
//! salt, and its verifier compares outputs in constant time.

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::config::SecurityConfig;

/// Concatenates plaintext and salt in storage order.
#[must_use]
pub fn salt_password(password: &str, salt: &str) -> String {
    format!("{password}{salt}")
}

/// Generate a fresh 128-bit random salt.
#[must_use]
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Clone)]
pub struct SaltedHasher {
    params: Params,
}

impl SaltedHasher {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

        Ok(Self { params })
    }

    /// Hashes `password || salt` into an Argon2id PHC string.
    pub fn hash(&self, password: &str, salt: &str) -> Result<String> {
        let phc_salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(salt_password(password, salt).as_bytes(), &phc_salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

        Ok(hash.to_string())
    }

    /// Checks `password || salt` against a stored digest.
    ///
    /// A digest that does not parse never verifies.
    #[must_use]
    pub fn verify(&self, password: &str, salt: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };

        // Cost parameters come from the PHC string, not from `self.params`.
        Argon2::default()
            .verify_password(salt_password(password, salt).as_bytes(), &parsed)
            .is_ok()
    }

    /// [`Self::hash`] on the blocking pool; Argon2 would otherwise stall the runtime.
    pub async fn hash_blocking(&self, password: &str, salt: &str) -> Result<String> {
        let hasher = self.clone();
        let password = password.to_string();
        let salt = salt.to_string();

        task::spawn_blocking(move || hasher.hash(&password, &salt))
            .await
            .context("Password hashing task panicked")?
    }

    pub async fn verify_blocking(&self, password: &str, salt: &str, digest: &str) -> Result<bool> {
        let hasher = self.clone();
        let password = password.to_string();
        let salt = salt.to_string();
        let digest = digest.to_string();

        task::spawn_blocking(move || hasher.verify(&password, &salt, &digest))
            .await
            .context("Password verification task panicked")
    }
}
