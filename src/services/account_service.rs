//! Domain service for account administration.
//!
//! Covers the user lifecycle: create, enable/disable, password change, delete.

use serde::Serialize;
use thiserror::Error;

use crate::entities::users;

pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_PASSWORD_LEN: usize = 256;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Current password is not correct.")]
    IncorrectPassword,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Integrity violation: {0} users share the username")]
    IntegrityViolation(usize),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// User info DTO for responses. Never carries the hash or salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub enabled: bool,
    pub created_date: String,
    pub last_login_date: Option<String>,
}

impl From<users::Model> for UserInfo {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            enabled: user.enabled,
            created_date: user.created_date,
            last_login_date: user.last_login_date,
        }
    }
}

/// Checks a username is 1 to 64 characters.
pub fn validate_username(username: &str) -> Result<(), AccountError> {
    let len = username.chars().count();
    if len == 0 || len > MAX_USERNAME_LEN {
        return Err(AccountError::Validation(format!(
            "Username must be 1-{MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Checks a password is 1 to 256 characters.
pub fn validate_password(password: &str) -> Result<(), AccountError> {
    let len = password.chars().count();
    if len == 0 || len > MAX_PASSWORD_LEN {
        return Err(AccountError::Validation(format!(
            "Password must be 1-{MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Domain service trait for account administration.
#[async_trait::async_trait]
pub trait AccountAdministrator: Send + Sync {
    /// Creates a user with a fresh salt.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::DuplicateUsername`] if the name is taken, whether
    /// the pre-check or the storage constraint catches it.
    async fn create(
        &self,
        username: &str,
        password: &str,
        enabled: bool,
    ) -> Result<UserInfo, AccountError>;

    async fn delete(&self, username: &str) -> Result<(), AccountError>;

    /// Idempotent.
    async fn enable(&self, username: &str) -> Result<UserInfo, AccountError>;

    /// Idempotent.
    async fn disable(&self, username: &str) -> Result<UserInfo, AccountError>;

    /// Re-hashes under the stored salt after checking the current password.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::IncorrectPassword`] when `current_password` does
    /// not verify; the stored hash is left untouched.
    async fn update_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError>;

    async fn get(&self, username: &str) -> Result<UserInfo, AccountError>;

    /// All users ordered by username.
    async fn list(&self) -> Result<Vec<UserInfo>, AccountError>;
}
