//! Emote alias repository.

use std::sync::Arc;

use crate::entities::{EmoteAlias, emote_alias};
use eevee_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder};

/// Emote alias repository for database operations.
#[derive(Clone)]
pub struct EmoteAliasRepository {
    db: Arc<DatabaseConnection>,
}

impl EmoteAliasRepository {
    /// Create a new emote alias repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Load every alias in creation order.
    pub async fn find_all(&self) -> AppResult<Vec<emote_alias::Model>> {
        EmoteAlias::find()
            .order_by_asc(emote_alias::Column::CreatedAt)
            .order_by_asc(emote_alias::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new alias.
    pub async fn create(&self, model: emote_alias::ActiveModel) -> AppResult<emote_alias::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an alias.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        EmoteAlias::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
