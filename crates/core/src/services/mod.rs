//! Registry services.

#![allow(missing_docs)]

pub mod access;
pub mod alias;
pub mod allocator;
pub mod cache;
pub mod cooldown;
pub mod emote;
pub mod resolver;
pub mod storage;

pub use access::{AccessLedger, Capability, Principal};
pub use alias::AliasService;
pub use allocator::{CapacityAllocator, ContainerUsage, Reservation};
pub use cache::{CacheState, ReconcileReport, RuntimeCache};
pub use cooldown::CooldownGate;
pub use emote::{EmoteService, Registration};
pub use storage::{
    AssetFetcher, ContainerCapacity, EmoteContainer, HostedAsset, HttpAssetFetcher,
    MemoryContainer, SourceAsset,
};
