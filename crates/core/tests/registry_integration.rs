//! Registry integration tests.
//!
//! Every test runs against a fresh in-memory SQLite database migrated with the
//! real schema and a pool of in-process containers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eevee_common::{AppError, AppResult, RegistryConfig};
use eevee_core::{
    AssetFetcher, Capability, ContainerCapacity, EmoteContainer, EmoteRegistry, HostedAsset,
    MemoryContainer, Principal, SourceAsset,
};
use eevee_db::entities::{Emote, EmoteAlias, emote};
use eevee_db::test_utils::memory_database;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use tokio::sync::Notify;

struct StubFetcher;

#[async_trait]
impl AssetFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> AppResult<Bytes> {
        Ok(Bytes::from_static(b"\x89PNG"))
    }
}

struct FailingFetcher;

#[async_trait]
impl AssetFetcher for FailingFetcher {
    async fn fetch(&self, url: &str) -> AppResult<Bytes> {
        Err(AppError::Transfer(format!("connection reset while fetching {url}")))
    }
}

struct Harness {
    registry: EmoteRegistry,
    db: Arc<DatabaseConnection>,
    containers: Vec<Arc<MemoryContainer>>,
}

fn config() -> RegistryConfig {
    RegistryConfig {
        cooldown_secs: 1,
        ..RegistryConfig::default()
    }
}

async fn harness_with(pool: &[(&str, usize)], fetcher: Arc<dyn AssetFetcher>) -> Harness {
    let db = memory_database().await.unwrap();
    let containers: Vec<Arc<MemoryContainer>> = pool
        .iter()
        .map(|(id, slots)| {
            Arc::new(MemoryContainer::new(
                *id,
                ContainerCapacity {
                    static_slots: *slots,
                    animated_slots: *slots,
                },
            ))
        })
        .collect();
    let pool: Vec<Arc<dyn EmoteContainer>> = containers
        .iter()
        .map(|c| Arc::clone(c) as Arc<dyn EmoteContainer>)
        .collect();

    let registry = EmoteRegistry::bootstrap(Arc::clone(&db), &config(), pool, fetcher)
        .await
        .unwrap();

    Harness {
        registry,
        db,
        containers,
    }
}

async fn harness(pool: &[(&str, usize)]) -> Harness {
    harness_with(pool, Arc::new(StubFetcher)).await
}

fn source(id: &str, name: &str) -> SourceAsset {
    SourceAsset {
        id: id.to_string(),
        name: name.to_string(),
        is_animated: false,
        url: format!("https://cdn.example.com/emojis/{id}.png"),
    }
}

async fn stored_emotes(db: &DatabaseConnection) -> u64 {
    Emote::find().count(db).await.unwrap()
}

async fn stored_aliases(db: &DatabaseConnection) -> u64 {
    EmoteAlias::find().count(db).await.unwrap()
}

// ==================== Capacity allocation ====================

#[tokio::test]
async fn test_first_fit_until_exhausted() {
    let h = harness(&[("a", 1), ("b", 1)]).await;

    let first = h.registry.register_emote("u1", &source("1", "one"), None).await.unwrap();
    let second = h.registry.register_emote("u1", &source("2", "two"), None).await.unwrap();
    assert_eq!(first.emote.container_id, "a");
    assert_eq!(second.emote.container_id, "b");
    assert!(!first.reused);

    let third = h.registry.register_emote("u1", &source("3", "three"), None).await;
    assert!(matches!(third, Err(AppError::StorageExhausted)));

    // Nothing was written for the rejected asset.
    assert_eq!(stored_emotes(&h.db).await, 2);
    assert_eq!(h.registry.stats().await.emotes, 2);
    assert!(h.registry.resolve_emote("u1", "three").await.is_none());
}

#[tokio::test]
async fn test_animated_class_has_its_own_ceiling() {
    let h = harness(&[("a", 1)]).await;

    h.registry.register_emote("u1", &source("1", "one"), None).await.unwrap();

    let mut dance = source("2", "dance");
    dance.is_animated = true;
    let registered = h.registry.register_emote("u1", &dance, None).await.unwrap();

    assert_eq!(registered.emote.container_id, "a");
    assert!(registered.emote.relative_path.ends_with(".gif"));
}

#[tokio::test]
async fn test_same_source_twice_reuses_record() {
    let h = harness(&[("a", 1), ("b", 1)]).await;

    let first = h.registry.register_emote("u1", &source("1", "one"), None).await.unwrap();
    let second = h.registry.register_emote("u2", &source("1", "one"), None).await.unwrap();

    assert!(second.reused);
    assert_eq!(first.emote.id, second.emote.id);
    assert_eq!(first.emote.container_id, second.emote.container_id);
    assert_eq!(second.emote.source_id, "1");
    assert_eq!(stored_emotes(&h.db).await, 1);
    assert_eq!(h.containers[1].occupancy(false).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_same_source_yields_one_record() {
    let h = harness(&[("a", 1), ("b", 1)]).await;
    let asset = source("1", "one");

    let (left, right) = tokio::join!(
        h.registry.register_emote("u1", &asset, None),
        h.registry.register_emote("u2", &asset, None),
    );
    let (left, right) = (left.unwrap(), right.unwrap());

    assert_eq!(left.emote.id, right.emote.id);
    assert!(left.reused ^ right.reused);
    assert_eq!(stored_emotes(&h.db).await, 1);
}

#[tokio::test]
async fn test_concurrent_registrations_share_last_slot() {
    let h = harness(&[("a", 1)]).await;

    let (src1, src2) = (source("1", "one"), source("2", "two"));
    let (left, right) = tokio::join!(
        h.registry.register_emote("u1", &src1, None),
        h.registry.register_emote("u2", &src2, None),
    );

    let outcomes = [left, right];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::StorageExhausted))));
    assert_eq!(stored_emotes(&h.db).await, 1);
}

#[tokio::test]
async fn test_overlapping_registrations_fill_container() {
    let h = harness(&[("a", 2)]).await;

    let (src1, src2) = (source("1", "one"), source("2", "two"));
    let (left, right) = tokio::join!(
        h.registry.register_emote("u1", &src1, None),
        h.registry.register_emote("u2", &src2, None),
    );

    assert_eq!(left.unwrap().emote.container_id, "a");
    assert_eq!(right.unwrap().emote.container_id, "a");
    assert_eq!(h.containers[0].occupancy(false).await.unwrap(), 2);
    assert_eq!(stored_emotes(&h.db).await, 2);
}

#[tokio::test]
async fn test_uploaded_slot_is_not_held_after_registration() {
    let h = harness(&[("a", 2)]).await;

    h.registry.register_emote("u1", &source("1", "one"), None).await.unwrap();
    let second = h.registry.register_emote("u1", &source("2", "two"), None).await.unwrap();
    assert_eq!(second.emote.container_id, "a");

    let third = h.registry.register_emote("u1", &source("3", "three"), None).await;
    assert!(matches!(third, Err(AppError::StorageExhausted)));
}

#[tokio::test]
async fn test_asset_hosted_in_pool_is_not_uploaded() {
    let h = harness(&[("a", 1), ("b", 2)]).await;
    h.containers[1]
        .seed(HostedAsset {
            id: "777".to_string(),
            name: "frog".to_string(),
            is_animated: false,
            url: "https://cdn.example.com/emojis/777.png".to_string(),
        })
        .unwrap();

    let registered = h.registry.register_emote("u1", &source("777", "frog"), None).await.unwrap();

    assert!(registered.reused);
    assert_eq!(registered.emote.id, "777");
    assert_eq!(registered.emote.container_id, "b");
    assert_eq!(h.containers[0].occupancy(false).await.unwrap(), 0);
    assert_eq!(h.containers[1].occupancy(false).await.unwrap(), 1);

    // Deleting a record for a pre-hosted asset leaves the asset in place.
    h.registry.delete_emote(&registered.emote).await.unwrap();
    assert_eq!(h.containers[1].occupancy(false).await.unwrap(), 1);
}

#[tokio::test]
async fn test_name_collision_rejected() {
    let h = harness(&[("a", 2)]).await;

    h.registry.register_emote("u1", &source("1", "pog"), None).await.unwrap();
    let result = h.registry.register_emote("u1", &source("2", "POG"), None).await;

    assert!(matches!(result, Err(AppError::AlreadyExists(_))));
    assert_eq!(h.containers[0].occupancy(false).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_transfer_rolls_back() {
    let h = harness_with(&[("a", 1)], Arc::new(FailingFetcher)).await;

    let result = h.registry.register_emote("u1", &source("1", "one"), None).await;
    assert!(matches!(result, Err(AppError::Rejected(_))));

    assert_eq!(stored_emotes(&h.db).await, 0);
    let usage = h.registry.container_usage().await.unwrap();
    assert_eq!(usage[0].static_used, 0);
}

#[tokio::test]
async fn test_container_usage() {
    let h = harness(&[("a", 1), ("b", 3)]).await;

    h.registry.register_emote("u1", &source("1", "one"), None).await.unwrap();
    h.registry.register_emote("u1", &source("2", "two"), None).await.unwrap();

    let usage = h.registry.container_usage().await.unwrap();
    assert_eq!(usage[0].container_id, "a");
    assert_eq!((usage[0].static_used, usage[0].static_capacity), (1, 1));
    assert_eq!((usage[1].static_used, usage[1].static_capacity), (1, 3));
}

// ==================== Aliases ====================

#[tokio::test]
async fn test_alias_rules() {
    let h = harness(&[("a", 1)]).await;
    let frog = h
        .registry
        .register_emote("u1", &source("1", "frog"), None)
        .await
        .unwrap()
        .emote;

    h.registry.add_alias("u1", &frog, "pog").await.unwrap();
    assert!(matches!(
        h.registry.add_alias("u1", &frog, "p").await,
        Err(AppError::TooShort { .. })
    ));
    h.registry.add_alias("u1", &frog, "pogu").await.unwrap();
    h.registry.add_alias("u1", &frog, "poggers").await.unwrap();

    match h.registry.add_alias("u1", &frog, "pogchamp").await {
        Err(AppError::CapacityExceeded { limit, aliases }) => {
            assert_eq!(limit, 2);
            assert_eq!(aliases, ["pog", "pogu", "poggers"]);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }

    // Another user has their own allowance.
    h.registry.add_alias("u2", &frog, "pogchamp").await.unwrap();
    assert_eq!(stored_aliases(&h.db).await, 4);
}

#[tokio::test]
async fn test_alias_resolution_and_deletion() {
    let h = harness(&[("a", 1)]).await;
    let frog = h
        .registry
        .register_emote("u1", &source("1", "frog"), None)
        .await
        .unwrap()
        .emote;

    h.registry.add_alias("u2", &frog, ":ribbit:").await.unwrap();
    assert_eq!(h.registry.resolve_emote("u2", ":RIBBIT:").await.unwrap().id, frog.id);
    assert!(h.registry.resolve_emote("u1", "ribbit").await.is_none());

    // Taken text is rejected for the same user only.
    assert!(matches!(
        h.registry.add_alias("u2", &frog, "ribbit").await,
        Err(AppError::AlreadyExists(_))
    ));

    h.registry.delete_alias("u2", "Ribbit").await.unwrap();
    assert!(h.registry.resolve_emote("u2", "ribbit").await.is_none());
    assert!(matches!(
        h.registry.delete_alias("u2", "ribbit").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(stored_aliases(&h.db).await, 0);
}

#[tokio::test]
async fn test_register_with_alias_and_delete_cascades() {
    let h = harness(&[("a", 1)]).await;

    let registered = h
        .registry
        .register_emote("u1", &source("1", "frog"), Some("froggy"))
        .await
        .unwrap();
    assert!(matches!(registered.alias, Some(Ok(_))));
    assert_eq!(h.registry.aliases_for("u1", &registered.emote.id).await.len(), 1);

    h.registry.delete_emote(&registered.emote).await.unwrap();

    assert!(h.registry.resolve_emote("u1", "frog").await.is_none());
    assert!(h.registry.resolve_emote("u1", "froggy").await.is_none());
    assert_eq!(stored_emotes(&h.db).await, 0);
    assert_eq!(stored_aliases(&h.db).await, 0);
    // The uploaded copy is gone and its slot is free again.
    assert_eq!(h.containers[0].occupancy(false).await.unwrap(), 0);
    assert!(matches!(
        h.registry.delete_emote(&registered.emote).await,
        Err(AppError::NotFound(_))
    ));
}

/// Container whose removals wait until the test releases them.
struct StallingContainer {
    inner: MemoryContainer,
    removing: Notify,
    release: Notify,
}

#[async_trait]
impl EmoteContainer for StallingContainer {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn capacity(&self) -> ContainerCapacity {
        self.inner.capacity()
    }

    async fn find_asset(&self, asset_id: &str) -> AppResult<Option<HostedAsset>> {
        self.inner.find_asset(asset_id).await
    }

    async fn occupancy(&self, animated: bool) -> AppResult<usize> {
        self.inner.occupancy(animated).await
    }

    async fn upload(&self, name: &str, data: Bytes, animated: bool) -> AppResult<HostedAsset> {
        self.inner.upload(name, data, animated).await
    }

    async fn remove(&self, asset_id: &str) -> AppResult<()> {
        self.removing.notify_one();
        self.release.notified().await;
        self.inner.remove(asset_id).await
    }
}

#[tokio::test]
async fn test_slow_container_removal_does_not_block_writes() {
    let db = memory_database().await.unwrap();
    let container = Arc::new(StallingContainer {
        inner: MemoryContainer::new(
            "a",
            ContainerCapacity {
                static_slots: 2,
                animated_slots: 2,
            },
        ),
        removing: Notify::new(),
        release: Notify::new(),
    });
    let pool: Vec<Arc<dyn EmoteContainer>> = vec![Arc::clone(&container) as Arc<dyn EmoteContainer>];
    let registry = Arc::new(
        EmoteRegistry::bootstrap(Arc::clone(&db), &config(), pool, Arc::new(StubFetcher))
            .await
            .unwrap(),
    );

    let pog = registry.register_emote("u1", &source("1", "pog"), None).await.unwrap().emote;
    let kek = registry.register_emote("u1", &source("2", "kek"), None).await.unwrap().emote;

    let deletion = tokio::spawn({
        let registry = Arc::clone(&registry);
        async move { registry.delete_emote(&pog).await }
    });
    container.removing.notified().await;

    // The emote is gone from the cache while its asset is still being removed.
    assert!(registry.resolve_emote("u1", "pog").await.is_none());
    let alias = tokio::time::timeout(
        Duration::from_secs(5),
        registry.add_alias("u1", &kek, "kekw"),
    )
    .await
    .expect("alias add waited on the container");
    assert!(alias.is_ok());

    container.release.notify_one();
    deletion.await.unwrap().unwrap();
    assert_eq!(container.occupancy(false).await.unwrap(), 1);
}

#[tokio::test]
async fn test_inline_resolution_and_search() {
    let h = harness(&[("a", 5)]).await;
    h.registry.register_emote("u1", &source("1", "pog"), None).await.unwrap();
    h.registry.register_emote("u1", &source("2", "kek"), None).await.unwrap();

    let found = h.registry.resolve_inline("u1", "lol :kek: :nope: :pog:").await;
    let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["kek", "pog"]);

    assert_eq!(h.registry.search_emotes("u1", "ke").await.len(), 1);
    assert_eq!(h.registry.list_emotes("u1").await.len(), 2);
}

// ==================== Reconciliation ====================

#[tokio::test]
async fn test_restart_reconciles_with_store() {
    let h = harness(&[("a", 5)]).await;
    let frog = h
        .registry
        .register_emote("u1", &source("1", "frog"), Some("ribbit"))
        .await
        .unwrap()
        .emote;
    h.registry.register_emote("u1", &source("2", "toad"), None).await.unwrap();

    // The store changes behind the registry's back.
    EmoteAlias::delete_many().exec(h.db.as_ref()).await.unwrap();
    Emote::delete_by_id("a000002").exec(h.db.as_ref()).await.unwrap();
    emote::ActiveModel {
        id: Set("900".to_string()),
        adder_id: Set("u3".to_string()),
        container_id: Set("a".to_string()),
        source_id: Set("900".to_string()),
        name: Set("newt".to_string()),
        is_animated: Set(false),
        url: Set("https://cdn.example.com/emojis/900.png".to_string()),
        relative_path: Set(emote::Model::relative_path_for("900", false)),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(h.db.as_ref())
    .await
    .unwrap();

    let report = h.registry.reload().await.unwrap();
    assert_eq!(report.emotes_added, 1);
    assert_eq!(report.emotes_pruned, 1);
    assert_eq!(report.aliases_pruned, 1);

    assert_eq!(h.registry.resolve_emote("u1", "frog").await.unwrap().id, frog.id);
    assert!(h.registry.resolve_emote("u1", "ribbit").await.is_none());
    assert!(h.registry.resolve_emote("u1", "toad").await.is_none());
    assert_eq!(h.registry.resolve_emote("u1", "newt").await.unwrap().id, "900");

    // A fresh process sees the same state.
    let restarted = EmoteRegistry::bootstrap(
        Arc::clone(&h.db),
        &config(),
        Vec::new(),
        Arc::new(StubFetcher),
    )
    .await
    .unwrap();
    let stats = restarted.stats().await;
    assert_eq!((stats.emotes, stats.aliases), (2, 0));
}

// ==================== Access control ====================

#[tokio::test]
async fn test_ownership_transfer() {
    let h = harness(&[("a", 1)]).await;
    let ledger = &h.registry;

    assert!(ledger.can_change_owner("u1").await.unwrap());
    ledger.transfer_ownership("u1", &Principal::user("u1")).await.unwrap();
    assert!(ledger.is_owner("u1").await.unwrap());

    assert!(matches!(
        ledger.transfer_ownership("u2", &Principal::user("u3")).await,
        Err(AppError::NotOwner)
    ));

    ledger.transfer_ownership("u1", &Principal::user("u2")).await.unwrap();
    assert!(ledger.is_owner("u2").await.unwrap());
    assert!(!ledger.is_owner("u1").await.unwrap());
    assert!(ledger.is_allowed("u1").await.unwrap());

    let owners = ledger
        .allowlist()
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.is_owner)
        .count();
    assert_eq!(owners, 1);
    assert!(!ledger.can_change_owner("u1").await.unwrap());
}

#[tokio::test]
async fn test_first_allowed_user_becomes_owner() {
    let h = harness(&[("a", 1)]).await;
    let ledger = &h.registry;

    ledger.add_allowed("u1", &Principal::user("u1")).await.unwrap();
    assert!(ledger.is_owner("u1").await.unwrap());

    assert!(matches!(
        ledger.add_allowed("u9", &Principal::user("u9")).await,
        Err(AppError::NotAllowed)
    ));

    ledger.add_allowed("u1", &Principal::user("u2")).await.unwrap();
    assert!(ledger.is_allowed("u2").await.unwrap());
    assert!(!ledger.is_owner("u2").await.unwrap());

    assert!(matches!(
        ledger.add_allowed("u1", &Principal::bot("b1")).await,
        Err(AppError::BotUserRejected)
    ));

    let list = ledger.allowlist().await.unwrap();
    assert_eq!(list[0].id, "u1");
    assert_eq!(list.len(), 2);
}

#[tokio::test]
async fn test_lists_are_mutually_exclusive() {
    let h = harness(&[("a", 1)]).await;
    let ledger = &h.registry;

    ledger.add_allowed("u1", &Principal::user("u1")).await.unwrap();
    ledger.add_allowed("u1", &Principal::user("u2")).await.unwrap();

    ledger.add_denied("u1", &Principal::user("u2")).await.unwrap();
    assert!(ledger.is_denied("u2").await.unwrap());
    assert!(!ledger.is_allowed("u2").await.unwrap());

    ledger.add_allowed("u1", &Principal::user("u2")).await.unwrap();
    assert!(ledger.is_allowed("u2").await.unwrap());
    assert!(!ledger.is_denied("u2").await.unwrap());

    assert!(matches!(
        ledger.add_denied("u2", &Principal::user("u1")).await,
        Err(AppError::Rejected(_))
    ));
    assert!(matches!(
        ledger.add_denied("u9", &Principal::user("u2")).await,
        Err(AppError::NotAllowed)
    ));
}

#[tokio::test]
async fn test_list_removal_permissions() {
    let h = harness(&[("a", 1)]).await;
    let ledger = &h.registry;

    ledger.add_allowed("u1", &Principal::user("u1")).await.unwrap();
    ledger.add_allowed("u1", &Principal::user("u2")).await.unwrap();
    ledger.add_allowed("u1", &Principal::user("u3")).await.unwrap();
    ledger.add_denied("u1", &Principal::user("u4")).await.unwrap();

    assert!(matches!(
        ledger.remove_allowed("u2", "u3").await,
        Err(AppError::NotOwner)
    ));
    ledger.remove_allowed("u3", "u3").await.unwrap();
    ledger.remove_allowed("u1", "u2").await.unwrap();
    assert!(!ledger.is_allowed("u2").await.unwrap());

    assert!(matches!(
        ledger.remove_denied("u2", "u4").await,
        Err(AppError::NotOwner)
    ));
    ledger.remove_denied("u1", "u4").await.unwrap();
    assert!(ledger.denylist().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_authorize_capabilities() {
    let h = harness(&[("a", 1)]).await;
    let registry = &h.registry;

    registry.add_allowed("u1", &Principal::user("u1")).await.unwrap();
    registry.add_allowed("u1", &Principal::user("u2")).await.unwrap();

    assert!(registry.authorize("u9", Capability::Anyone).await.is_ok());
    assert!(registry.authorize("u2", Capability::Allowed).await.is_ok());
    assert!(matches!(
        registry.authorize("u9", Capability::Allowed).await,
        Err(AppError::NotAllowed)
    ));
    assert!(registry.authorize("u1", Capability::Owner).await.is_ok());
    assert!(matches!(
        registry.authorize("u2", Capability::Owner).await,
        Err(AppError::NotOwner)
    ));
}

// ==================== Admission ====================

#[tokio::test]
async fn test_cooldown_window() {
    let h = harness(&[("a", 1)]).await;
    let registry = &h.registry;

    assert!(registry.admit_request("u1"));
    registry.commit_request("u1", true);
    assert!(!registry.admit_request("u1"));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(registry.admit_request("u1"));

    registry.commit_request("u1", false);
    assert!(registry.admit_request("u1"));
}

#[tokio::test]
async fn test_admission_policy() {
    let h = harness(&[("a", 1)]).await;
    let registry = &h.registry;

    assert!(matches!(
        registry.check_admission(&Principal::bot("b1")).await,
        Err(AppError::BotUserRejected)
    ));

    registry.add_allowed("u1", &Principal::user("u1")).await.unwrap();
    registry.add_denied("u1", &Principal::user("u3")).await.unwrap();
    assert!(matches!(
        registry.check_admission(&Principal::user("u3")).await,
        Err(AppError::NotAllowed)
    ));

    // The owner leaves; with nobody owning the bot the deny-list is ignored.
    registry.remove_allowed("u1", "u1").await.unwrap();
    assert!(registry.check_admission(&Principal::user("u3")).await.is_ok());

    registry.transfer_ownership("u5", &Principal::user("u5")).await.unwrap();
    assert!(matches!(
        registry.check_admission(&Principal::user("u3")).await,
        Err(AppError::NotAllowed)
    ));

    registry.commit_request("u4", true);
    assert!(matches!(
        registry.check_admission(&Principal::user("u4")).await,
        Err(AppError::CoolingDown { retry_after_ms }) if retry_after_ms <= 1000
    ));
}
