//! `SeaORM` implementation of the `Authenticator` trait.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use tracing::{error, info, warn};

use crate::db::Store;
use crate::domain::{Lookup, utc_timestamp};
use crate::entities::users;
use crate::services::auth_service::{AuthError, Authenticator, Identity};
use crate::services::password::{SaltedHasher, generate_salt};

/// Why a login was refused. Only ever logged.
enum Refusal {
    UnknownOrDisabled,
    WrongPassword,
    Integrity(usize),
    Storage(anyhow::Error),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOrDisabled => write!(f, "no enabled user with that name"),
            Self::WrongPassword => write!(f, "password mismatch"),
            Self::Integrity(n) => write!(f, "{n} enabled users share the username"),
            Self::Storage(e) => write!(f, "storage error: {e:#}"),
        }
    }
}

pub struct SeaOrmAuthenticator {
    store: Store,
    hasher: SaltedHasher,
    /// Verified against on a lookup miss so misses cost as much as mismatches.
    dummy_salt: String,
    dummy_digest: String,
}

impl SeaOrmAuthenticator {
    pub fn new(store: Store, hasher: SaltedHasher) -> Result<Self> {
        let dummy_salt = generate_salt();
        let dummy_digest = hasher.hash(&generate_salt(), &dummy_salt)?;

        Ok(Self {
            store,
            hasher,
            dummy_salt,
            dummy_digest,
        })
    }

    async fn check(&self, username: &str, password: &str) -> Result<Identity, Refusal> {
        let user = match self.store.find_enabled_user_by_username(username).await {
            Ok(Lookup::Found(user)) => user,
            Ok(Lookup::NotFound) => {
                let _ = self
                    .hasher
                    .verify_blocking(password, &self.dummy_salt, &self.dummy_digest)
                    .await;
                return Err(Refusal::UnknownOrDisabled);
            }
            Ok(Lookup::IntegrityViolation(n)) => return Err(Refusal::Integrity(n)),
            Err(e) => return Err(Refusal::Storage(e)),
        };

        let matches = self
            .hasher
            .verify_blocking(password, &user.salt, &user.password_hash)
            .await
            .map_err(Refusal::Storage)?;

        if !matches {
            return Err(Refusal::WrongPassword);
        }

        self.record_login(user).await.map_err(Refusal::Storage)
    }

    /// The login only counts once the new timestamp is persisted.
    async fn record_login(&self, user: users::Model) -> Result<Identity> {
        let updated = self.store.record_user_login(user, utc_timestamp()).await?;
        Ok(Identity::from(updated))
    }
}

#[async_trait]
impl Authenticator for SeaOrmAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        match self.check(username, password).await {
            Ok(identity) => {
                counter!("auth_login_total", "outcome" => "success").increment(1);
                info!(user_id = identity.id, username = %identity.username, "Login succeeded");
                Ok(identity)
            }
            Err(refusal) => {
                counter!("auth_login_total", "outcome" => "failure").increment(1);
                match &refusal {
                    Refusal::Integrity(_) | Refusal::Storage(_) => {
                        error!(username, reason = %refusal, "Login aborted");
                    }
                    Refusal::UnknownOrDisabled | Refusal::WrongPassword => {
                        warn!(username, reason = %refusal, "Login refused");
                    }
                }
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::db::NewUser;
    use chrono::DateTime;

    fn hasher() -> SaltedHasher {
        SaltedHasher::new(&SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        })
        .unwrap()
    }

    async fn seed(store: &Store, username: &str, password: &str, enabled: bool) -> users::Model {
        let salt = generate_salt();
        let password_hash = hasher().hash(password, &salt).unwrap();
        store
            .insert_user(
                NewUser {
                    username: username.to_string(),
                    password_hash,
                    salt,
                    enabled,
                },
                utc_timestamp(),
            )
            .await
            .unwrap()
    }

    async fn setup() -> (Store, SeaOrmAuthenticator) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let auth = SeaOrmAuthenticator::new(store.clone(), hasher()).unwrap();
        (store, auth)
    }

    #[tokio::test]
    async fn correct_credentials_record_login_time() {
        let (store, auth) = setup().await;
        let seeded = seed(&store, "admin", "s3cret", true).await;
        assert!(seeded.last_login_date.is_none());

        let first = auth.authenticate("admin", "s3cret").await.unwrap();
        assert_eq!(first.id, seeded.id);
        assert_eq!(first.username, "admin");
        let first_login = first.last_login_date.clone().unwrap();

        let second = auth.authenticate("admin", "s3cret").await.unwrap();
        let second_login = second.last_login_date.unwrap();

        let first_at = DateTime::parse_from_rfc3339(&first_login).unwrap();
        let second_at = DateTime::parse_from_rfc3339(&second_login).unwrap();
        assert!(second_at >= first_at);

        let stored = store.find_user_by_id(seeded.id).await.unwrap().found().unwrap();
        assert_eq!(stored.last_login_date, Some(second_login));
    }

    #[tokio::test]
    async fn every_failure_looks_the_same() {
        let (store, auth) = setup().await;
        seed(&store, "active", "right", true).await;
        seed(&store, "dormant", "right", false).await;

        let unknown = auth.authenticate("ghost", "right").await.unwrap_err();
        let wrong = auth.authenticate("active", "wrong").await.unwrap_err();
        let disabled = auth.authenticate("dormant", "right").await.unwrap_err();

        for err in [&unknown, &wrong, &disabled] {
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(wrong.to_string(), disabled.to_string());
    }

    #[tokio::test]
    async fn refused_login_leaves_last_login_untouched() {
        let (store, auth) = setup().await;
        let seeded = seed(&store, "admin", "s3cret", true).await;

        auth.authenticate("admin", "nope").await.unwrap_err();

        let stored = store.find_user_by_id(seeded.id).await.unwrap().found().unwrap();
        assert!(stored.last_login_date.is_none());
    }

    #[tokio::test]
    async fn failed_login_write_fails_the_login() {
        use sea_orm::ConnectionTrait;

        let (store, auth) = setup().await;
        let seeded = seed(&store, "admin", "s3cret", true).await;
        store
            .conn
            .execute_unprepared(
                "CREATE TRIGGER users_login_frozen BEFORE UPDATE OF last_login_date ON users \
                 BEGIN SELECT RAISE(ABORT, 'last_login_date is frozen'); END;",
            )
            .await
            .unwrap();

        let err = auth.authenticate("admin", "s3cret").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let stored = store.find_user_by_id(seeded.id).await.unwrap().found().unwrap();
        assert!(stored.last_login_date.is_none());
    }

    #[tokio::test]
    async fn username_match_is_case_sensitive() {
        let (store, auth) = setup().await;
        seed(&store, "Admin", "s3cret", true).await;

        assert!(auth.authenticate("admin", "s3cret").await.is_err());
        assert!(auth.authenticate("Admin", "s3cret").await.is_ok());
    }
}
