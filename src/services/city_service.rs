//! Domain service for user-contributed city records.
//!
//! A city belongs to one subdivision and `(subdivision, name)` is unique.

use serde::Serialize;
use thiserror::Error;

use crate::entities::cities;
use crate::reference::{ReferenceError, SubdivisionKey};

pub const MAX_CITY_NAME_LEN: usize = 64;

/// DTO for a city record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub subdivision: String,
}

impl From<cities::Model> for City {
    fn from(model: cities::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            subdivision: model.subdivision,
        }
    }
}

/// Errors specific to city operations.
#[derive(Debug, Error)]
pub enum CityError {
    #[error("City name must be 1-{MAX_CITY_NAME_LEN} characters")]
    Length,

    #[error("Invalid subdivision reference: {0}")]
    InvalidReference(String),

    #[error("City already exists: {name} in {subdivision}")]
    Duplicate { subdivision: String, name: String },

    #[error("City not found: {0}")]
    NotFound(i64),

    #[error("Integrity violation: {0} cities share the id")]
    IntegrityViolation(usize),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for CityError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CityError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

impl From<ReferenceError> for CityError {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::Malformed(key) | ReferenceError::Unknown(key) => {
                Self::InvalidReference(key)
            }
        }
    }
}

/// Rejects empty names and names longer than the column allows.
pub fn validate_city_name(name: &str) -> Result<(), CityError> {
    let len = name.chars().count();
    if len == 0 || len > MAX_CITY_NAME_LEN {
        return Err(CityError::Length);
    }
    Ok(())
}

/// Domain service trait for city records.
#[async_trait::async_trait]
pub trait CityRegistry: Send + Sync {
    /// Cities in a subdivision in ascending name order.
    async fn list(&self, subdivision: &SubdivisionKey) -> Result<Vec<City>, CityError>;

    async fn get(&self, id: i64) -> Result<City, CityError>;

    /// Validates the name, then the subdivision reference, then persists.
    ///
    /// # Errors
    ///
    /// [`CityError::Length`], [`CityError::InvalidReference`], or
    /// [`CityError::Duplicate`]; nothing is written in any of those cases.
    async fn create(&self, name: &str, subdivision: &str) -> Result<City, CityError>;

    /// Overwrites both fields of an existing record.
    async fn update(&self, id: i64, name: &str, subdivision: &str) -> Result<City, CityError>;

    /// Deleting a missing id is an error, not a no-op.
    async fn delete(&self, id: i64) -> Result<(), CityError>;
}
