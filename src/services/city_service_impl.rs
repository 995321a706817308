//! `SeaORM` implementation of the `CityRegistry` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::db::{Store, is_unique_violation};
use crate::domain::Lookup;
use crate::entities::cities;
use crate::reference::{ReferenceLookup, SubdivisionKey};
use crate::services::city_service::{City, CityError, CityRegistry, validate_city_name};

pub struct SeaOrmCityRegistry {
    store: Store,
    reference: Arc<dyn ReferenceLookup>,
}

impl SeaOrmCityRegistry {
    #[must_use]
    pub fn new(store: Store, reference: Arc<dyn ReferenceLookup>) -> Self {
        Self { store, reference }
    }

    async fn load(&self, id: i64) -> Result<cities::Model, CityError> {
        match self.store.find_city(id).await? {
            Lookup::Found(city) => Ok(city),
            Lookup::NotFound => Err(CityError::NotFound(id)),
            Lookup::IntegrityViolation(n) => {
                error!(city_id = id, rows = n, "City id uniqueness violated in storage");
                Err(CityError::IntegrityViolation(n))
            }
        }
    }

    fn duplicate_or(err: anyhow::Error, key: &SubdivisionKey, name: &str) -> CityError {
        if is_unique_violation(&err) {
            CityError::Duplicate {
                subdivision: key.to_string(),
                name: name.to_string(),
            }
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl CityRegistry for SeaOrmCityRegistry {
    async fn list(&self, subdivision: &SubdivisionKey) -> Result<Vec<City>, CityError> {
        let rows = self.store.list_cities(&subdivision.to_string()).await?;
        Ok(rows.into_iter().map(City::from).collect())
    }

    async fn get(&self, id: i64) -> Result<City, CityError> {
        self.load(id).await.map(City::from)
    }

    async fn create(&self, name: &str, subdivision: &str) -> Result<City, CityError> {
        validate_city_name(name)?;
        let key = self.reference.check_subdivision(subdivision)?;

        let city = self
            .store
            .insert_city(key.to_string(), name.to_string())
            .await
            .map_err(|e| Self::duplicate_or(e, &key, name))?;

        info!(city_id = city.id, subdivision = %key, name, "City created");
        Ok(City::from(city))
    }

    async fn update(&self, id: i64, name: &str, subdivision: &str) -> Result<City, CityError> {
        let existing = self.load(id).await?;
        validate_city_name(name)?;
        let key = self.reference.check_subdivision(subdivision)?;

        let city = self
            .store
            .update_city(existing, key.to_string(), name.to_string())
            .await
            .map_err(|e| Self::duplicate_or(e, &key, name))?;

        info!(city_id = id, subdivision = %key, name, "City updated");
        Ok(City::from(city))
    }

    async fn delete(&self, id: i64) -> Result<(), CityError> {
        let city = self.load(id).await?;
        self.store.delete_city(city).await?;
        info!(city_id = id, "City deleted");
        Ok(())
    }
}
