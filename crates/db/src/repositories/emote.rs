//! Emote repository.

use std::sync::Arc;

use crate::entities::{Emote, EmoteAlias, emote, emote_alias};
use eevee_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

/// Emote repository for database operations.
#[derive(Clone)]
pub struct EmoteRepository {
    db: Arc<DatabaseConnection>,
}

impl EmoteRepository {
    /// Create a new emote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Load every emote in registration order.
    pub async fn find_all(&self) -> AppResult<Vec<emote::Model>> {
        Emote::find()
            .order_by_asc(emote::Column::CreatedAt)
            .order_by_asc(emote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new emote.
    pub async fn create(&self, model: emote::ActiveModel) -> AppResult<emote::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an emote together with every alias that references it.
    ///
    /// Returns the number of aliases removed.
    pub async fn delete_with_aliases(&self, id: &str) -> AppResult<u64> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let aliases = EmoteAlias::delete_many()
            .filter(emote_alias::Column::EmoteId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Emote::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(aliases.rows_affected)
    }
}
