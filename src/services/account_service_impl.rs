//! `SeaORM` implementation of the `AccountAdministrator` trait.

use async_trait::async_trait;
use tracing::{error, info};

use crate::db::{NewUser, Store, is_unique_violation};
use crate::domain::{Lookup, utc_timestamp};
use crate::entities::users;
use crate::services::account_service::{
    AccountAdministrator, AccountError, UserInfo, validate_password, validate_username,
};
use crate::services::password::{SaltedHasher, generate_salt};

pub struct SeaOrmAccountAdministrator {
    store: Store,
    hasher: SaltedHasher,
}

impl SeaOrmAccountAdministrator {
    #[must_use]
    pub const fn new(store: Store, hasher: SaltedHasher) -> Self {
        Self { store, hasher }
    }

    async fn load(&self, username: &str) -> Result<users::Model, AccountError> {
        match self.store.find_user_by_username(username).await? {
            Lookup::Found(user) => Ok(user),
            Lookup::NotFound => Err(AccountError::NotFound(username.to_string())),
            Lookup::IntegrityViolation(n) => {
                error!(username, rows = n, "Username uniqueness violated in storage");
                Err(AccountError::IntegrityViolation(n))
            }
        }
    }

    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<UserInfo, AccountError> {
        let user = self.load(username).await?;
        let updated = self.store.set_user_enabled(user, enabled).await?;
        info!(username, enabled, "User enabled flag updated");
        Ok(UserInfo::from(updated))
    }
}

#[async_trait]
impl AccountAdministrator for SeaOrmAccountAdministrator {
    async fn create(
        &self,
        username: &str,
        password: &str,
        enabled: bool,
    ) -> Result<UserInfo, AccountError> {
        validate_username(username)?;
        validate_password(password)?;

        if self.store.username_exists(username).await? {
            return Err(AccountError::DuplicateUsername(username.to_string()));
        }

        let salt = generate_salt();
        let password_hash = self
            .hasher
            .hash_blocking(password, &salt)
            .await
            .map_err(|e| AccountError::Internal(e.to_string()))?;

        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
            salt,
            enabled,
        };

        // The pre-check above is racy; the unique index is what actually holds.
        let user = match self.store.insert_user(new_user, utc_timestamp()).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => {
                return Err(AccountError::DuplicateUsername(username.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = user.id, username, enabled, "User created");
        Ok(UserInfo::from(user))
    }

    async fn delete(&self, username: &str) -> Result<(), AccountError> {
        let user = self.load(username).await?;
        self.store.delete_user(user).await?;
        info!(username, "User deleted");
        Ok(())
    }

    async fn enable(&self, username: &str) -> Result<UserInfo, AccountError> {
        self.set_enabled(username, true).await
    }

    async fn disable(&self, username: &str) -> Result<UserInfo, AccountError> {
        self.set_enabled(username, false).await
    }

    async fn update_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        validate_password(new_password)?;

        let user = self.load(username).await?;

        let matches = self
            .hasher
            .verify_blocking(current_password, &user.salt, &user.password_hash)
            .await
            .map_err(|e| AccountError::Internal(e.to_string()))?;

        if !matches {
            return Err(AccountError::IncorrectPassword);
        }

        let password_hash = self
            .hasher
            .hash_blocking(new_password, &user.salt)
            .await
            .map_err(|e| AccountError::Internal(e.to_string()))?;

        self.store.set_user_password_hash(user, password_hash).await?;
        info!(username, "Password updated");
        Ok(())
    }

    async fn get(&self, username: &str) -> Result<UserInfo, AccountError> {
        self.load(username).await.map(UserInfo::from)
    }

    async fn list(&self) -> Result<Vec<UserInfo>, AccountError> {
        let users = self.store.list_users().await?;
        Ok(users.into_iter().map(UserInfo::from).collect())
    }
}
