//! Create emote_aliases table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // No foreign key to emotes: alias deletion is cascaded by the registry.
        manager
            .create_table(
                Table::create()
                    .table(EmoteAliases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmoteAliases::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmoteAliases::EmoteId).string_len(32).not_null())
                    .col(ColumnDef::new(EmoteAliases::OwnerId).string_len(32).not_null())
                    .col(ColumnDef::new(EmoteAliases::Alias).string_len(128).not_null())
                    .col(
                        ColumnDef::new(EmoteAliases::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: emote_id (aliases of an emote, cascade delete)
        manager
            .create_index(
                Index::create()
                    .name("idx_emote_aliases_emote_id")
                    .table(EmoteAliases::Table)
                    .col(EmoteAliases::EmoteId)
                    .to_owned(),
            )
            .await?;

        // Index: owner_id (a user's alias namespace)
        manager
            .create_index(
                Index::create()
                    .name("idx_emote_aliases_owner_id")
                    .table(EmoteAliases::Table)
                    .col(EmoteAliases::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmoteAliases::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EmoteAliases {
    Table,
    Id,
    EmoteId,
    OwnerId,
    Alias,
    CreatedAt,
}
