use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::domain::Lookup;
use crate::entities::users;

/// Fields for a user row that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub enabled: bool,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Find the single user with this username
    pub async fn find_by_username(&self, username: &str) -> Result<Lookup<users::Model>> {
        let rows = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .limit(2)
            .all(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(Lookup::from_rows(rows))
    }

    /// Find the single enabled user with this username
    pub async fn find_enabled_by_username(&self, username: &str) -> Result<Lookup<users::Model>> {
        let rows = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::Enabled.eq(true))
            .limit(2)
            .all(&self.conn)
            .await
            .context("Failed to query enabled user by username")?;

        Ok(Lookup::from_rows(rows))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Lookup<users::Model>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(Lookup::from_option(user))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(&self.conn)
            .await
            .context("Failed to count users by username")?;

        Ok(count > 0)
    }

    pub async fn list(&self) -> Result<Vec<users::Model>> {
        users::Entity::find()
            .order_by_asc(users::Column::Username)
            .all(&self.conn)
            .await
            .context("Failed to list users")
    }

    /// Insert a user; the unique index on `username` rejects concurrent duplicates.
    pub async fn insert(&self, user: NewUser, created_date: String) -> Result<users::Model> {
        let active = users::ActiveModel {
            username: Set(user.username),
            password_hash: Set(user.password_hash),
            salt: Set(user.salt),
            enabled: Set(user.enabled),
            created_date: Set(created_date),
            last_login_date: Set(None),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")
    }

    pub async fn set_enabled(&self, user: users::Model, enabled: bool) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();
        active.enabled = Set(enabled);
        active
            .update(&self.conn)
            .await
            .context("Failed to update user enabled flag")
    }

    pub async fn set_password_hash(
        &self,
        user: users::Model,
        password_hash: String,
    ) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active
            .update(&self.conn)
            .await
            .context("Failed to update user password")
    }

    pub async fn set_last_login(&self, user: users::Model, at: String) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();
        active.last_login_date = Set(Some(at));
        active
            .update(&self.conn)
            .await
            .context("Failed to update last login date")
    }

    pub async fn delete(&self, user: users::Model) -> Result<()> {
        user.delete(&self.conn)
            .await
            .context("Failed to delete user")?;
        Ok(())
    }
}
