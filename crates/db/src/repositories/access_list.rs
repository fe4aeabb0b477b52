//! Allow-list and deny-list repository.
//!
//! Every mutation that touches both lists runs in one transaction so the
//! mutual exclusion between them holds in the store even if a step fails.

use std::sync::Arc;

use crate::entities::{AllowList, DenyList, allowlist, denylist};
use chrono::Utc;
use eevee_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

/// Access list repository for database operations.
#[derive(Clone)]
pub struct AccessListRepository {
    db: Arc<DatabaseConnection>,
}

impl AccessListRepository {
    /// Create a new access list repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ==================== Queries ====================

    /// Find an allow-list entry.
    pub async fn find_allowed(&self, id: &str) -> AppResult<Option<allowlist::Model>> {
        AllowList::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the owner entry, if anyone owns the bot.
    pub async fn find_owner(&self) -> AppResult<Option<allowlist::Model>> {
        AllowList::find()
            .filter(allowlist::Column::IsOwner.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count allow-list entries.
    pub async fn count_allowed(&self) -> AppResult<u64> {
        AllowList::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a user is on the deny-list.
    pub async fn is_denied(&self, id: &str) -> AppResult<bool> {
        let entry = DenyList::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(entry.is_some())
    }

    /// List the allow-list, owner first.
    pub async fn list_allowed(&self) -> AppResult<Vec<allowlist::Model>> {
        AllowList::find()
            .order_by_desc(allowlist::Column::IsOwner)
            .order_by_asc(allowlist::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List the deny-list.
    pub async fn list_denied(&self) -> AppResult<Vec<denylist::Model>> {
        DenyList::find()
            .order_by_asc(denylist::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Mutations ====================

    /// Put a user on the allow-list and take them off the deny-list.
    ///
    /// An existing entry keeps its owner flag; `is_owner` only applies to a
    /// newly created entry.
    pub async fn allow(&self, id: &str, is_owner: bool) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        async {
            if AllowList::find_by_id(id).one(&txn).await?.is_none() {
                insert_allowed(&txn, id, is_owner).await?;
            }
            remove_denied(&txn, id).await?;
            txn.commit().await
        }
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Put a user on the deny-list and take them off the allow-list.
    pub async fn deny(&self, id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        async {
            if DenyList::find_by_id(id).one(&txn).await?.is_none() {
                denylist::ActiveModel {
                    id: Set(id.to_string()),
                    created_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?;
            }
            AllowList::delete_by_id(id).exec(&txn).await?;
            txn.commit().await
        }
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove a user from the allow-list. Returns whether an entry existed.
    pub async fn remove_allowed(&self, id: &str) -> AppResult<bool> {
        let result = AllowList::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Remove a user from the deny-list. Returns whether an entry existed.
    pub async fn remove_denied(&self, id: &str) -> AppResult<bool> {
        remove_denied(self.db.as_ref(), id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Make `id` the owner while nobody holds ownership.
    pub async fn claim_owner(&self, id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        async {
            set_owner_flag(&txn, id, true).await?;
            remove_denied(&txn, id).await?;
            txn.commit().await
        }
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move ownership from `from` to `to`, creating `to`'s entry if needed.
    pub async fn transfer_owner(&self, from: &str, to: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        async {
            set_owner_flag(&txn, from, false).await?;
            set_owner_flag(&txn, to, true).await?;
            remove_denied(&txn, to).await?;
            txn.commit().await
        }
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }
}

async fn insert_allowed<C: ConnectionTrait>(conn: &C, id: &str, is_owner: bool) -> Result<(), DbErr> {
    allowlist::ActiveModel {
        id: Set(id.to_string()),
        is_owner: Set(is_owner),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(())
}

async fn set_owner_flag<C: ConnectionTrait>(conn: &C, id: &str, is_owner: bool) -> Result<(), DbErr> {
    match AllowList::find_by_id(id).one(conn).await? {
        Some(entry) if entry.is_owner == is_owner => Ok(()),
        Some(entry) => {
            let mut active: allowlist::ActiveModel = entry.into();
            active.is_owner = Set(is_owner);
            active.update(conn).await?;
            Ok(())
        }
        None => insert_allowed(conn, id, is_owner).await,
    }
}

async fn remove_denied<C: ConnectionTrait>(conn: &C, id: &str) -> Result<bool, DbErr> {
    let result = DenyList::delete_by_id(id).exec(conn).await?;
    Ok(result.rows_affected > 0)
}
