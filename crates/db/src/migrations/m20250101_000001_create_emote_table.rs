//! Create emotes table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Emotes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Emotes::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Emotes::AdderId).string_len(32).not_null())
                    .col(ColumnDef::new(Emotes::ContainerId).string_len(32).not_null())
                    .col(ColumnDef::new(Emotes::SourceId).string_len(32).not_null())
                    .col(ColumnDef::new(Emotes::Name).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Emotes::IsAnimated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Emotes::Url).string_len(1024).not_null())
                    .col(ColumnDef::new(Emotes::RelativePath).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Emotes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: source_id (re-registration of an already uploaded asset)
        manager
            .create_index(
                Index::create()
                    .name("idx_emotes_source_id")
                    .table(Emotes::Table)
                    .col(Emotes::SourceId)
                    .to_owned(),
            )
            .await?;

        // Index: container_id (occupancy reports)
        manager
            .create_index(
                Index::create()
                    .name("idx_emotes_container_id")
                    .table(Emotes::Table)
                    .col(Emotes::ContainerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Emotes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Emotes {
    Table,
    Id,
    AdderId,
    ContainerId,
    SourceId,
    Name,
    IsAnimated,
    Url,
    RelativePath,
    CreatedAt,
}
