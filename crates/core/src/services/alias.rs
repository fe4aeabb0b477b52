//! Private per-user emote aliases.

use chrono::Utc;
use eevee_common::{AppError, AppResult, IdGenerator, RegistryConfig};
use eevee_db::{entities::emote_alias, repositories::EmoteAliasRepository};
use sea_orm::Set;
use tracing::info;

use super::cache::RuntimeCache;
use super::resolver;

/// Alias service for business logic.
#[derive(Clone)]
pub struct AliasService {
    cache: RuntimeCache,
    alias_repo: EmoteAliasRepository,
    min_length: usize,
    max_length: usize,
    max_per_emote: usize,
    id_gen: IdGenerator,
}

impl AliasService {
    /// Create a new alias service.
    #[must_use]
    pub fn new(cache: RuntimeCache, alias_repo: EmoteAliasRepository, config: &RegistryConfig) -> Self {
        Self {
            cache,
            alias_repo,
            min_length: config.min_alias_length,
            max_length: config.max_alias_length,
            max_per_emote: config.max_aliases_per_user_per_emote,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add an alias for `user_id` on an emote.
    ///
    /// Fails with `TooShort`, `TooLong`, `AlreadyExists` (the user already
    /// resolves the text to some emote), `CapacityExceeded` or `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, user_id: &str, emote_id: &str, text: &str) -> AppResult<emote_alias::Model> {
        let alias = resolver::clean_alias(text);
        let length = alias.chars().count();

        if length < self.min_length {
            return Err(AppError::TooShort {
                min: self.min_length,
                actual: length,
            });
        }
        if length > self.max_length {
            return Err(AppError::TooLong {
                max: self.max_length,
                actual: length,
            });
        }

        let _writes = self.cache.lock_writes().await;
        {
            let state = self.cache.read().await;

            if state.emote(emote_id).is_none() {
                return Err(AppError::NotFound(format!("emote {emote_id}")));
            }

            if let Some(existing) = resolver::resolve(&state, user_id, &alias) {
                return Err(AppError::AlreadyExists(format!(
                    "{alias} already resolves to {}",
                    existing.name
                )));
            }

            let owned: Vec<String> = state
                .owned_aliases_of(emote_id, user_id)
                .map(|a| a.alias.clone())
                .collect();
            if owned.len() > self.max_per_emote {
                return Err(AppError::CapacityExceeded {
                    limit: self.max_per_emote,
                    aliases: owned,
                });
            }
        }

        let model = emote_alias::ActiveModel {
            id: Set(self.id_gen.generate()),
            emote_id: Set(emote_id.to_string()),
            owner_id: Set(user_id.to_string()),
            alias: Set(alias),
            created_at: Set(Utc::now()),
        };
        let created = self.alias_repo.create(model).await?;
        self.cache.insert_alias(created.clone()).await;

        info!(alias_id = %created.id, emote_id, user_id, alias = %created.alias, "Alias added");
        Ok(created)
    }

    /// Delete the user's alias matching `text`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, user_id: &str, text: &str) -> AppResult<()> {
        let alias = resolver::clean_alias(text);

        let _writes = self.cache.lock_writes().await;
        let alias_id = self
            .cache
            .read()
            .await
            .aliases()
            .find(|a| a.owner_id == user_id && a.matches(&alias))
            .map(|a| a.id.clone())
            .ok_or_else(|| AppError::NotFound(format!("alias {alias}")))?;

        self.alias_repo.delete(&alias_id).await?;
        self.cache.remove_alias(&alias_id).await;

        info!(alias_id = %alias_id, user_id, "Alias deleted");
        Ok(())
    }

    /// The user's aliases on an emote.
    pub async fn aliases_for(&self, user_id: &str, emote_id: &str) -> Vec<emote_alias::Model> {
        self.cache
            .read()
            .await
            .owned_aliases_of(emote_id, user_id)
            .cloned()
            .collect()
    }
}
