//! Domain service for login verification and bearer-token identity.
//!
//! Every login failure collapses into [`AuthError::InvalidCredentials`]. The
//! underlying cause is logged server side and never returned to the caller.

use serde::Serialize;
use thiserror::Error;

use crate::entities::users;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credential")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token issue failed: {0}")]
    TokenIssue(String),
}

/// The authenticated principal behind a login or a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i32,
    pub username: String,
    pub last_login_date: Option<String>,
}

impl From<users::Model> for Identity {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            last_login_date: user.last_login_date,
        }
    }
}

/// Domain service trait for verifying a username/password pair.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Verifies credentials and records the login time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user, a
    /// disabled user, a wrong password, or any storage failure alike.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AuthError>;
}
