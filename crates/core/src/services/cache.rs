//! In-memory mirror of the emote and alias tables.
//!
//! The cache is built by [`RuntimeCache::reconcile`] at startup and mutated in
//! lock-step with every store write afterwards. Readers take the read half of
//! an `RwLock`; writers first take [`RuntimeCache::lock_writes`] so that a
//! check against the cache, the store write and the cache mutation happen as
//! one step with respect to other writers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use eevee_db::entities::{emote, emote_alias};
use indexmap::IndexMap;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Cache contents. Both maps keep insertion order.
#[derive(Debug, Default)]
pub struct CacheState {
    emotes: IndexMap<String, emote::Model>,
    aliases: IndexMap<String, emote_alias::Model>,
    /// emote id -> alias ids, in attachment order.
    by_emote: HashMap<String, Vec<String>>,
}

impl CacheState {
    /// Emotes in insertion order.
    pub fn emotes(&self) -> impl Iterator<Item = &emote::Model> {
        self.emotes.values()
    }

    /// Look up an emote by id.
    #[must_use]
    pub fn emote(&self, id: &str) -> Option<&emote::Model> {
        self.emotes.get(id)
    }

    /// Find the record created from a given source asset.
    #[must_use]
    pub fn find_by_source(&self, source_id: &str) -> Option<&emote::Model> {
        self.emotes.values().find(|e| e.source_id == source_id)
    }

    /// Every cached alias in insertion order.
    pub fn aliases(&self) -> impl Iterator<Item = &emote_alias::Model> {
        self.aliases.values()
    }

    /// Look up an alias by id.
    #[must_use]
    pub fn alias(&self, id: &str) -> Option<&emote_alias::Model> {
        self.aliases.get(id)
    }

    /// Aliases attached to an emote, in attachment order.
    pub fn aliases_of<'a>(
        &'a self,
        emote_id: &str,
    ) -> impl Iterator<Item = &'a emote_alias::Model> + use<'a> {
        self.by_emote
            .get(emote_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.aliases.get(id))
    }

    /// Aliases a user owns on an emote.
    pub fn owned_aliases_of<'a>(
        &'a self,
        emote_id: &str,
        owner_id: &'a str,
    ) -> impl Iterator<Item = &'a emote_alias::Model> + use<'a> {
        self.aliases_of(emote_id)
            .filter(move |a| a.owner_id == owner_id)
    }

    /// Number of cached emotes.
    #[must_use]
    pub fn emote_count(&self) -> usize {
        self.emotes.len()
    }

    /// Number of cached aliases.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Insert or replace an emote, keeping its position if already present.
    fn insert_emote(&mut self, model: emote::Model) -> bool {
        let id = model.id.clone();
        let fresh = self.emotes.insert(id.clone(), model).is_none();
        if fresh {
            self.by_emote.entry(id).or_default();
        }
        fresh
    }

    /// Remove an emote and every alias attached to it.
    fn remove_emote(&mut self, id: &str) -> Option<(emote::Model, Vec<emote_alias::Model>)> {
        let model = self.emotes.shift_remove(id)?;
        let aliases = self
            .by_emote
            .remove(id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|alias_id| self.aliases.shift_remove(&alias_id))
            .collect();

        Some((model, aliases))
    }

    /// Attach an alias. Returns false when its emote is not cached.
    fn insert_alias(&mut self, model: emote_alias::Model) -> bool {
        let Some(ids) = self.by_emote.get_mut(&model.emote_id) else {
            return false;
        };

        if !ids.contains(&model.id) {
            ids.push(model.id.clone());
        }
        self.aliases.insert(model.id.clone(), model);
        true
    }

    /// Detach and remove an alias.
    fn remove_alias(&mut self, id: &str) -> Option<emote_alias::Model> {
        let model = self.aliases.shift_remove(id)?;
        if let Some(ids) = self.by_emote.get_mut(&model.emote_id) {
            ids.retain(|alias_id| alias_id != id);
        }
        Some(model)
    }
}

/// Counters reported by a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub emotes_added: usize,
    pub emotes_pruned: usize,
    pub aliases_added: usize,
    pub aliases_pruned: usize,
    /// Store aliases skipped because their emote does not exist.
    pub aliases_orphaned: usize,
}

/// Shared handle to the runtime cache.
#[derive(Clone, Default)]
pub struct RuntimeCache {
    state: Arc<RwLock<CacheState>>,
    writer: Arc<Mutex<()>>,
}

impl RuntimeCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a read view of the cache.
    pub async fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().await
    }

    /// Serialize a check-then-write sequence against other writers.
    ///
    /// Readers are not blocked while the guard is held; only the individual
    /// mutations below take the write half of the lock.
    pub async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Insert or replace an emote.
    pub async fn insert_emote(&self, model: emote::Model) {
        self.state.write().await.insert_emote(model);
    }

    /// Remove an emote together with its aliases.
    pub async fn remove_emote(
        &self,
        id: &str,
    ) -> Option<(emote::Model, Vec<emote_alias::Model>)> {
        self.state.write().await.remove_emote(id)
    }

    /// Attach an alias to its emote. Returns false when the emote is missing.
    pub async fn insert_alias(&self, model: emote_alias::Model) -> bool {
        self.state.write().await.insert_alias(model)
    }

    /// Remove an alias.
    pub async fn remove_alias(&self, id: &str) -> Option<emote_alias::Model> {
        self.state.write().await.remove_alias(id)
    }

    /// Make the cache set-equal to the given store contents.
    ///
    /// Emotes absent from the store are pruned before aliases are attached,
    /// so an alias is only ever attached to an emote that survives the pass.
    pub async fn reconcile(
        &self,
        emotes: Vec<emote::Model>,
        aliases: Vec<emote_alias::Model>,
    ) -> ReconcileReport {
        let _writes = self.lock_writes().await;
        let mut state = self.state.write().await;
        let mut report = ReconcileReport::default();

        let emote_ids: HashSet<String> = emotes.iter().map(|e| e.id.clone()).collect();
        let alias_ids: HashSet<String> = aliases.iter().map(|a| a.id.clone()).collect();

        for model in emotes {
            if state.insert_emote(model) {
                report.emotes_added += 1;
            }
        }

        let stale_emotes: Vec<String> = state
            .emotes
            .keys()
            .filter(|id| !emote_ids.contains(*id))
            .cloned()
            .collect();
        for id in stale_emotes {
            if let Some((_, detached)) = state.remove_emote(&id) {
                debug!(emote_id = %id, aliases = detached.len(), "Pruned emote missing from store");
                report.emotes_pruned += 1;
                report.aliases_pruned += detached.len();
            }
        }

        for model in aliases {
            if state.aliases.contains_key(&model.id) {
                continue;
            }
            let (alias_id, emote_id) = (model.id.clone(), model.emote_id.clone());
            if state.insert_alias(model) {
                report.aliases_added += 1;
            } else {
                warn!(alias_id = %alias_id, emote_id = %emote_id, "Skipping alias of unknown emote");
                report.aliases_orphaned += 1;
            }
        }

        let stale_aliases: Vec<String> = state
            .aliases
            .keys()
            .filter(|id| !alias_ids.contains(*id))
            .cloned()
            .collect();
        for id in stale_aliases {
            if state.remove_alias(&id).is_some() {
                report.aliases_pruned += 1;
            }
        }

        info!(
            emotes = state.emote_count(),
            aliases = state.alias_count(),
            added_emotes = report.emotes_added,
            pruned_emotes = report.emotes_pruned,
            added_aliases = report.aliases_added,
            pruned_aliases = report.aliases_pruned,
            orphaned_aliases = report.aliases_orphaned,
            "Runtime cache reconciled"
        );

        report
    }
}
