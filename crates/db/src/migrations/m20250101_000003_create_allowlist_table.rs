//! Create allowlist table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Allowlist::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allowlist::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Allowlist::IsOwner)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Allowlist::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: is_owner (owner lookup)
        manager
            .create_index(
                Index::create()
                    .name("idx_allowlist_is_owner")
                    .table(Allowlist::Table)
                    .col(Allowlist::IsOwner)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Allowlist::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Allowlist {
    Table,
    Id,
    IsOwner,
    CreatedAt,
}
