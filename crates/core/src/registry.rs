//! The registry facade handed to the command layer.
//!
//! [`EmoteRegistry`] wires the cache, the services and the access ledger to
//! one database connection and one container pool. Build it with
//! [`EmoteRegistry::bootstrap`], which reconciles the cache before returning,
//! so no request can observe a cold cache.

use std::sync::Arc;

use eevee_common::{AppError, AppResult, RegistryConfig};
use eevee_db::{
    entities::{allowlist, denylist, emote, emote_alias},
    repositories::{AccessListRepository, EmoteAliasRepository, EmoteRepository},
};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::services::{
    AccessLedger, AliasService, AssetFetcher, CapacityAllocator, Capability, ContainerUsage,
    CooldownGate, EmoteContainer, EmoteService, Principal, ReconcileReport, Registration,
    RuntimeCache, SourceAsset, resolver,
};

/// Number of emotes and aliases currently cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached emotes.
    pub emotes: usize,
    /// Cached aliases.
    pub aliases: usize,
}

/// Emote registry and access-control core.
pub struct EmoteRegistry {
    cache: RuntimeCache,
    emote_repo: EmoteRepository,
    alias_repo: EmoteAliasRepository,
    emotes: EmoteService,
    aliases: AliasService,
    allocator: Arc<CapacityAllocator>,
    ledger: AccessLedger,
    cooldown: CooldownGate,
}

impl EmoteRegistry {
    /// Wire a registry with an empty cache. Callers go through `bootstrap`.
    fn new(
        db: Arc<DatabaseConnection>,
        config: &RegistryConfig,
        containers: Vec<Arc<dyn EmoteContainer>>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        let cache = RuntimeCache::new();
        let emote_repo = EmoteRepository::new(Arc::clone(&db));
        let alias_repo = EmoteAliasRepository::new(Arc::clone(&db));
        let allocator = Arc::new(CapacityAllocator::new(
            containers,
            fetcher,
            config.transfer_timeout(),
        ));
        let aliases = AliasService::new(cache.clone(), alias_repo.clone(), config);
        let emotes = EmoteService::new(
            cache.clone(),
            emote_repo.clone(),
            Arc::clone(&allocator),
            aliases.clone(),
        );

        Self {
            cache,
            emote_repo,
            alias_repo,
            emotes,
            aliases,
            allocator,
            ledger: AccessLedger::new(AccessListRepository::new(db)),
            cooldown: CooldownGate::new(config.cooldown()),
        }
    }

    /// Wire a registry and reconcile its cache against the store.
    pub async fn bootstrap(
        db: Arc<DatabaseConnection>,
        config: &RegistryConfig,
        containers: Vec<Arc<dyn EmoteContainer>>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> AppResult<Self> {
        let registry = Self::new(db, config, containers, fetcher);
        registry.reload().await?;
        Ok(registry)
    }

    /// Reconcile the cache with the current store contents.
    pub async fn reload(&self) -> AppResult<ReconcileReport> {
        let emotes = self.emote_repo.find_all().await?;
        let aliases = self.alias_repo.find_all().await?;
        Ok(self.cache.reconcile(emotes, aliases).await)
    }

    /// Cache size.
    pub async fn stats(&self) -> CacheStats {
        let state = self.cache.read().await;
        CacheStats {
            emotes: state.emote_count(),
            aliases: state.alias_count(),
        }
    }

    // ==================== Resolution ====================

    /// Resolve free text to an emote as seen by `user_id`.
    pub async fn resolve_emote(&self, user_id: &str, text: &str) -> Option<emote::Model> {
        let state = self.cache.read().await;
        let found = resolver::resolve(&state, user_id, text).cloned();
        debug!(user_id, text, emote_id = found.as_ref().map(|e| e.id.as_str()), "Resolved emote");
        found
    }

    /// Resolve several tokens, dropping unknown ones.
    pub async fn resolve_many<S: AsRef<str>>(&self, user_id: &str, tokens: &[S]) -> Vec<emote::Model> {
        let state = self.cache.read().await;
        resolver::resolve_many(&state, user_id, tokens)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Resolve every `:token:` in a message.
    pub async fn resolve_inline(&self, user_id: &str, content: &str) -> Vec<emote::Model> {
        self.resolve_many(user_id, &resolver::inline_tokens(content))
            .await
    }

    /// Every emote, ordered for display to `user_id`.
    pub async fn list_emotes(&self, user_id: &str) -> Vec<emote::Model> {
        let state = self.cache.read().await;
        resolver::list(&state, user_id).into_iter().cloned().collect()
    }

    /// Emotes whose name or one of the caller's aliases contains `query`.
    pub async fn search_emotes(&self, user_id: &str, query: &str) -> Vec<emote::Model> {
        let state = self.cache.read().await;
        resolver::search(&state, user_id, query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The caller's aliases on an emote.
    pub async fn aliases_for(&self, user_id: &str, emote_id: &str) -> Vec<emote_alias::Model> {
        self.aliases.aliases_for(user_id, emote_id).await
    }

    // ==================== Registration ====================

    /// Register an asset, optionally adding an alias for the caller.
    pub async fn register_emote(
        &self,
        user_id: &str,
        source: &SourceAsset,
        alias: Option<&str>,
    ) -> AppResult<Registration> {
        self.emotes.register(user_id, source, alias).await
    }

    /// Add a private alias on an emote.
    pub async fn add_alias(
        &self,
        user_id: &str,
        emote: &emote::Model,
        text: &str,
    ) -> AppResult<emote_alias::Model> {
        self.aliases.add(user_id, &emote.id, text).await
    }

    /// Delete one of the caller's aliases.
    pub async fn delete_alias(&self, user_id: &str, text: &str) -> AppResult<()> {
        self.aliases.delete(user_id, text).await
    }

    /// Delete an emote and its aliases.
    pub async fn delete_emote(&self, emote: &emote::Model) -> AppResult<()> {
        self.emotes.delete(&emote.id).await
    }

    /// Occupancy of every container in the pool.
    pub async fn container_usage(&self) -> AppResult<Vec<ContainerUsage>> {
        self.allocator.usage().await
    }

    // ==================== Access control ====================

    /// Whether the user is allow-listed.
    pub async fn is_allowed(&self, user_id: &str) -> AppResult<bool> {
        self.ledger.is_allowed(user_id).await
    }

    /// Whether the user is deny-listed.
    pub async fn is_denied(&self, user_id: &str) -> AppResult<bool> {
        self.ledger.is_denied(user_id).await
    }

    /// Whether the user owns the bot.
    pub async fn is_owner(&self, user_id: &str) -> AppResult<bool> {
        self.ledger.is_owner(user_id).await
    }

    /// Whether the user may transfer ownership.
    pub async fn can_change_owner(&self, user_id: &str) -> AppResult<bool> {
        self.ledger.can_change_owner(user_id).await
    }

    /// Hand ownership to `target`, or claim it while nobody owns the bot.
    pub async fn transfer_ownership(&self, caller_id: &str, target: &Principal) -> AppResult<()> {
        self.ledger.transfer_ownership(caller_id, target).await
    }

    /// Allow-list `target`.
    pub async fn add_allowed(&self, caller_id: &str, target: &Principal) -> AppResult<()> {
        self.ledger.add_allowed(caller_id, target).await
    }

    /// Deny-list `target`.
    pub async fn add_denied(&self, caller_id: &str, target: &Principal) -> AppResult<()> {
        self.ledger.add_denied(caller_id, target).await
    }

    /// Remove `target_id` from the allow-list.
    pub async fn remove_allowed(&self, caller_id: &str, target_id: &str) -> AppResult<()> {
        self.ledger.remove_allowed(caller_id, target_id).await
    }

    /// Remove `target_id` from the deny-list.
    pub async fn remove_denied(&self, caller_id: &str, target_id: &str) -> AppResult<()> {
        self.ledger.remove_denied(caller_id, target_id).await
    }

    /// The allow-list, owner first.
    pub async fn allowlist(&self) -> AppResult<Vec<allowlist::Model>> {
        self.ledger.allowlist().await
    }

    /// The deny-list.
    pub async fn denylist(&self) -> AppResult<Vec<denylist::Model>> {
        self.ledger.denylist().await
    }

    /// Check a command's capability requirement for the caller.
    pub async fn authorize(&self, user_id: &str, capability: Capability) -> AppResult<()> {
        self.ledger.authorize(user_id, capability).await
    }

    // ==================== Admission ====================

    /// Cooldown check only. No side effects.
    #[must_use]
    pub fn admit_request(&self, user_id: &str) -> bool {
        self.cooldown.admit(user_id)
    }

    /// Record the outcome of an admitted request.
    pub fn commit_request(&self, user_id: &str, succeeded: bool) {
        self.cooldown.commit(user_id, succeeded);
    }

    /// The cooldown gate, for maintenance.
    #[must_use]
    pub const fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    /// Full admission policy for an incoming request.
    ///
    /// Bots are always rejected. Deny-listed users are rejected unless nobody
    /// owns the bot yet or they are also allow-listed.
    pub async fn check_admission(&self, principal: &Principal) -> AppResult<()> {
        if principal.is_bot {
            return Err(AppError::BotUserRejected);
        }

        if let Some(wait) = self.cooldown.retry_after(&principal.id) {
            let retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
            debug!(user_id = %principal.id, retry_after_ms, "Request rejected by cooldown");
            return Err(AppError::CoolingDown { retry_after_ms });
        }

        if self.ledger.is_denied(&principal.id).await?
            && self.ledger.has_owner().await?
            && !self.ledger.is_allowed(&principal.id).await?
        {
            debug!(user_id = %principal.id, "Request rejected by deny-list");
            return Err(AppError::NotAllowed);
        }

        Ok(())
    }
}
