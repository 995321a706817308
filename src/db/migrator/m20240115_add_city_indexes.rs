use sea_orm_migration::prelude::*;

use super::m20240101_initial::Cities;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Backstop for the (subdivision, name) check the registry cannot make race-free
        manager
            .create_index(
                Index::create()
                    .name("idx_cities_subdivision_name_unique")
                    .table(Cities::Table)
                    .col(Cities::Subdivision)
                    .col(Cities::Name)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cities_name")
                    .table(Cities::Table)
                    .col(Cities::Name)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_cities_name")
                    .table(Cities::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_cities_subdivision_name_unique")
                    .table(Cities::Table)
                    .to_owned(),
            )
            .await
    }
}
