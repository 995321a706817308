use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::Lookup;
use crate::entities::{cities, users};

pub mod migrator;
pub mod repositories;

pub use repositories::user::NewUser;

/// Handle to the connection pool. Built once at startup and handed to every
/// service that needs persistence.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        // Every SQLite in-memory connection is its own database, so the pool
        // must hold exactly one connection and never recycle it.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
            (max_connections, min_connections)
        };
        opt.max_connections(max_connections)
            .min_connections(min_connections);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn city_repo(&self) -> repositories::city::CityRepository {
        repositories::city::CityRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn find_user_by_username(&self, username: &str) -> Result<Lookup<users::Model>> {
        self.user_repo().find_by_username(username).await
    }

    pub async fn find_enabled_user_by_username(
        &self,
        username: &str,
    ) -> Result<Lookup<users::Model>> {
        self.user_repo().find_enabled_by_username(username).await
    }

    pub async fn find_user_by_id(&self, id: i32) -> Result<Lookup<users::Model>> {
        self.user_repo().find_by_id(id).await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        self.user_repo().username_exists(username).await
    }

    pub async fn list_users(&self) -> Result<Vec<users::Model>> {
        self.user_repo().list().await
    }

    pub async fn insert_user(&self, user: NewUser, created_date: String) -> Result<users::Model> {
        self.user_repo().insert(user, created_date).await
    }

    pub async fn set_user_enabled(
        &self,
        user: users::Model,
        enabled: bool,
    ) -> Result<users::Model> {
        self.user_repo().set_enabled(user, enabled).await
    }

    pub async fn set_user_password_hash(
        &self,
        user: users::Model,
        password_hash: String,
    ) -> Result<users::Model> {
        self.user_repo().set_password_hash(user, password_hash).await
    }

    pub async fn record_user_login(&self, user: users::Model, at: String) -> Result<users::Model> {
        self.user_repo().set_last_login(user, at).await
    }

    pub async fn delete_user(&self, user: users::Model) -> Result<()> {
        self.user_repo().delete(user).await
    }

    // ========== Cities ==========

    pub async fn list_cities(&self, subdivision: &str) -> Result<Vec<cities::Model>> {
        self.city_repo().list_for_subdivision(subdivision).await
    }

    pub async fn find_city(&self, id: i64) -> Result<Lookup<cities::Model>> {
        self.city_repo().find_by_id(id).await
    }

    pub async fn insert_city(&self, subdivision: String, name: String) -> Result<cities::Model> {
        self.city_repo().insert(subdivision, name).await
    }

    pub async fn update_city(
        &self,
        city: cities::Model,
        subdivision: String,
        name: String,
    ) -> Result<cities::Model> {
        self.city_repo().update(city, subdivision, name).await
    }

    pub async fn delete_city(&self, city: cities::Model) -> Result<()> {
        self.city_repo().delete(city).await
    }
}

/// True when the error chain bottoms out in a storage-level unique constraint.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<DbErr>())
        .any(|db_err| matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))))
}
