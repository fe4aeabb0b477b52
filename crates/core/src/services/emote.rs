//! Emote registration and deletion.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use eevee_common::{AppError, AppResult};
use eevee_db::{
    entities::{emote, emote_alias},
    repositories::EmoteRepository,
};
use sea_orm::Set;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::alias::AliasService;
use super::allocator::CapacityAllocator;
use super::cache::RuntimeCache;
use super::resolver;
use super::storage::{HostedAsset, SourceAsset};

/// Outcome of a successful registration.
#[derive(Debug)]
pub struct Registration {
    pub emote: emote::Model,
    /// No upload happened: the record or a hosted copy already existed.
    pub reused: bool,
    /// Result of the requested alias, if one was requested.
    pub alias: Option<AppResult<emote_alias::Model>>,
}

/// Emote service for business logic.
#[derive(Clone)]
pub struct EmoteService {
    cache: RuntimeCache,
    emote_repo: EmoteRepository,
    allocator: Arc<CapacityAllocator>,
    aliases: AliasService,
    /// One lock per source asset being registered.
    in_flight: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl EmoteService {
    /// Create a new emote service.
    #[must_use]
    pub fn new(
        cache: RuntimeCache,
        emote_repo: EmoteRepository,
        allocator: Arc<CapacityAllocator>,
        aliases: AliasService,
    ) -> Self {
        Self {
            cache,
            emote_repo,
            allocator,
            aliases,
            in_flight: Arc::default(),
        }
    }

    /// Register `source` on behalf of `user_id`.
    ///
    /// Errors: `AlreadyExists` when the user already resolves the name,
    /// `StorageExhausted` when no container has room for the asset's class,
    /// `Rejected` when the transfer fails. None of them leave state behind.
    #[tracing::instrument(skip(self, source), fields(source_id = %source.id, name = %source.name))]
    pub async fn register(
        &self,
        user_id: &str,
        source: &SourceAsset,
        alias: Option<&str>,
    ) -> AppResult<Registration> {
        let lock = Arc::clone(self.in_flight.entry(source.id.clone()).or_default().value());
        let guard = lock.lock().await;

        let result = self.register_locked(user_id, source, alias).await;

        drop(guard);
        drop(lock);
        self.in_flight
            .remove_if(&source.id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn register_locked(
        &self,
        user_id: &str,
        source: &SourceAsset,
        alias: Option<&str>,
    ) -> AppResult<Registration> {
        let existing = {
            let state = self.cache.read().await;
            state
                .emote(&source.id)
                .or_else(|| state.find_by_source(&source.id))
                .cloned()
        };
        if let Some(emote) = existing {
            info!(emote_id = %emote.id, "Asset already registered");
            return Ok(self.finish(user_id, emote, true, alias).await);
        }

        if let Some((container_id, hosted)) = self.allocator.find_hosted(&source.id).await? {
            info!(container_id = %container_id, "Asset already hosted in the pool");
            let emote = self
                .persist(user_id, &container_id, source, &hosted, false)
                .await?;
            return Ok(self.finish(user_id, emote, true, alias).await);
        }

        if let Some(existing) = resolver::resolve(&*self.cache.read().await, user_id, &source.name) {
            return Err(AppError::AlreadyExists(format!(
                "{} already resolves to an emote",
                existing.name
            )));
        }

        let reservation = self.allocator.reserve(source.is_animated).await?;
        let container_id = reservation.container_id().to_string();
        let hosted = self.allocator.transfer(reservation, source).await?;

        let persisted = self
            .persist(user_id, &container_id, source, &hosted, true)
            .await;

        match persisted {
            Ok(emote) => Ok(self.finish(user_id, emote, false, alias).await),
            Err(e) => {
                warn!(container_id = %container_id, asset_id = %hosted.id, error = %e, "Rolling back registration");
                self.allocator.remove_asset(&container_id, &hosted.id).await;
                Err(e)
            }
        }
    }

    /// Store a record for a hosted asset and cache it.
    async fn persist(
        &self,
        user_id: &str,
        container_id: &str,
        source: &SourceAsset,
        hosted: &HostedAsset,
        check_name: bool,
    ) -> AppResult<emote::Model> {
        let _writes = self.cache.lock_writes().await;
        {
            let state = self.cache.read().await;
            if let Some(existing) = state.emote(&hosted.id) {
                return Ok(existing.clone());
            }
            if check_name && resolver::resolve(&state, user_id, &hosted.name).is_some() {
                return Err(AppError::AlreadyExists(format!(
                    "{} already resolves to an emote",
                    hosted.name
                )));
            }
        }

        let model = emote::ActiveModel {
            id: Set(hosted.id.clone()),
            adder_id: Set(user_id.to_string()),
            container_id: Set(container_id.to_string()),
            source_id: Set(source.id.clone()),
            name: Set(hosted.name.clone()),
            is_animated: Set(hosted.is_animated),
            url: Set(hosted.url.clone()),
            relative_path: Set(emote::Model::relative_path_for(&hosted.id, hosted.is_animated)),
            created_at: Set(Utc::now()),
        };

        let created = self.emote_repo.create(model).await?;
        self.cache.insert_emote(created.clone()).await;

        info!(emote_id = %created.id, container_id, user_id, "Emote registered");
        Ok(created)
    }

    async fn finish(
        &self,
        user_id: &str,
        emote: emote::Model,
        reused: bool,
        alias: Option<&str>,
    ) -> Registration {
        let alias = match alias {
            Some(text) => Some(self.aliases.add(user_id, &emote.id, text).await),
            None => None,
        };

        Registration {
            emote,
            reused,
            alias,
        }
    }

    /// Delete an emote and every alias pointing at it.
    ///
    /// Assets this registry uploaded are removed from their container as well;
    /// assets that were already hosted in the pool are left alone.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, emote_id: &str) -> AppResult<()> {
        let writes = self.cache.lock_writes().await;

        let emote = self
            .cache
            .read()
            .await
            .emote(emote_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("emote {emote_id}")))?;

        let aliases = self.emote_repo.delete_with_aliases(emote_id).await?;
        self.cache.remove_emote(emote_id).await;
        drop(writes);

        // Container calls run after the cache is released.
        if emote.source_id != emote.id {
            self.allocator
                .remove_asset(&emote.container_id, &emote.id)
                .await;
        }

        info!(emote_id, aliases, "Emote deleted");
        Ok(())
    }
}
