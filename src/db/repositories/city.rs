use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::domain::Lookup;
use crate::entities::cities;

pub struct CityRepository {
    conn: DatabaseConnection,
}

impl CityRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Cities in a subdivision, ordered by name ascending
    pub async fn list_for_subdivision(&self, subdivision: &str) -> Result<Vec<cities::Model>> {
        cities::Entity::find()
            .filter(cities::Column::Subdivision.eq(subdivision))
            .order_by_asc(cities::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list cities for subdivision")
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Lookup<cities::Model>> {
        let rows = cities::Entity::find()
            .filter(cities::Column::Id.eq(id))
            .limit(2)
            .all(&self.conn)
            .await
            .context("Failed to query city by ID")?;

        Ok(Lookup::from_rows(rows))
    }

    /// Insert a city; the unique index on `(subdivision, name)` rejects duplicates.
    pub async fn insert(&self, subdivision: String, name: String) -> Result<cities::Model> {
        let active = cities::ActiveModel {
            subdivision: Set(subdivision),
            name: Set(name),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert city")
    }

    /// Overwrite both mutable fields and return the persisted row.
    pub async fn update(
        &self,
        city: cities::Model,
        subdivision: String,
        name: String,
    ) -> Result<cities::Model> {
        let mut active: cities::ActiveModel = city.into();
        active.subdivision = Set(subdivision);
        active.name = Set(name);
        active
            .update(&self.conn)
            .await
            .context("Failed to update city")
    }

    pub async fn delete(&self, city: cities::Model) -> Result<()> {
        city.delete(&self.conn)
            .await
            .context("Failed to delete city")?;
        Ok(())
    }
}
