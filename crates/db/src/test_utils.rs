//! Test utilities for database operations.
//!
//! Provides an in-memory SQLite database migrated with the real schema.

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing::info;

use crate::migrations::Migrator;

/// URL of a private in-memory SQLite database.
pub const MEMORY_URL: &str = "sqlite::memory:";

/// Connect to a fresh in-memory database and run all migrations.
///
/// The pool is pinned to a single connection: every SQLite in-memory
/// connection owns its own database.
pub async fn memory_database() -> Result<Arc<DatabaseConnection>, DbErr> {
    let mut opt = ConnectOptions::new(MEMORY_URL);
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let conn = Database::connect(opt).await?;
    Migrator::up(&conn, None).await?;

    info!("Created in-memory test database");

    Ok(Arc::new(conn))
}
