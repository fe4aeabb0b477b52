//! Storage containers and asset transfer.
//!
//! A container is an external host with a fixed number of emote slots per
//! animation class (on the chat platform, a guild). The registry only talks to
//! containers through [`EmoteContainer`]; platform-backed implementations live
//! with the transport layer.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eevee_common::{AppError, AppResult, ContainerConfig};
use serde::Serialize;
use tracing::debug;

/// Slot ceilings of one container. Static and animated slots are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContainerCapacity {
    pub static_slots: usize,
    pub animated_slots: usize,
}

impl ContainerCapacity {
    /// Ceiling for the given animation class.
    #[must_use]
    pub const fn for_class(&self, animated: bool) -> usize {
        if animated {
            self.animated_slots
        } else {
            self.static_slots
        }
    }
}

impl From<&ContainerConfig> for ContainerCapacity {
    fn from(config: &ContainerConfig) -> Self {
        Self {
            static_slots: config.static_capacity,
            animated_slots: config.animated_capacity,
        }
    }
}

/// An asset somebody asked to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAsset {
    /// Asset ID on the platform.
    pub id: String,
    pub name: String,
    pub is_animated: bool,
    /// Where the bytes can be fetched from.
    pub url: String,
}

/// An asset held by a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedAsset {
    /// ID assigned by the container.
    pub id: String,
    pub name: String,
    pub is_animated: bool,
    pub url: String,
}

/// A capacity-bounded external host for emote assets.
#[async_trait]
pub trait EmoteContainer: Send + Sync {
    /// Stable container ID.
    fn id(&self) -> &str;

    /// Slot ceilings.
    fn capacity(&self) -> ContainerCapacity;

    /// Look up an asset held by this container.
    async fn find_asset(&self, asset_id: &str) -> AppResult<Option<HostedAsset>>;

    /// Number of occupied slots in one animation class.
    async fn occupancy(&self, animated: bool) -> AppResult<usize>;

    /// Upload bytes into a free slot.
    async fn upload(&self, name: &str, data: Bytes, animated: bool) -> AppResult<HostedAsset>;

    /// Remove an asset. Removing an unknown asset is not an error.
    async fn remove(&self, asset_id: &str) -> AppResult<()>;
}

/// Fetches asset bytes from a URL.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<Bytes>;
}

/// In-process container.
pub struct MemoryContainer {
    id: String,
    capacity: ContainerCapacity,
    assets: Mutex<Vec<HostedAsset>>,
    next_id: AtomicU64,
}

impl MemoryContainer {
    /// Create an empty container.
    #[must_use]
    pub fn new(id: impl Into<String>, capacity: ContainerCapacity) -> Self {
        Self {
            id: id.into(),
            capacity,
            assets: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create an empty container from its configuration.
    #[must_use]
    pub fn from_config(config: &ContainerConfig) -> Self {
        Self::new(config.id.clone(), ContainerCapacity::from(config))
    }

    /// Add an asset that is already hosted, bypassing the slot ceiling.
    pub fn seed(&self, asset: HostedAsset) -> AppResult<()> {
        self.lock()?.push(asset);
        Ok(())
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Vec<HostedAsset>>> {
        self.assets
            .lock()
            .map_err(|_| AppError::Storage(format!("container {} is poisoned", self.id)))
    }
}

#[async_trait]
impl EmoteContainer for MemoryContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn capacity(&self) -> ContainerCapacity {
        self.capacity
    }

    async fn find_asset(&self, asset_id: &str) -> AppResult<Option<HostedAsset>> {
        Ok(self.lock()?.iter().find(|a| a.id == asset_id).cloned())
    }

    async fn occupancy(&self, animated: bool) -> AppResult<usize> {
        Ok(self
            .lock()?
            .iter()
            .filter(|a| a.is_animated == animated)
            .count())
    }

    async fn upload(&self, name: &str, data: Bytes, animated: bool) -> AppResult<HostedAsset> {
        if data.is_empty() {
            return Err(AppError::Storage("empty asset".to_string()));
        }

        let mut assets = self.lock()?;
        let used = assets.iter().filter(|a| a.is_animated == animated).count();
        if used >= self.capacity.for_class(animated) {
            return Err(AppError::Storage(format!("container {} is full", self.id)));
        }

        let id = format!("{}{:06}", self.id, self.next_id.fetch_add(1, Ordering::Relaxed));
        let ext = if animated { "gif" } else { "png" };
        let asset = HostedAsset {
            url: format!("memory://{}/{id}.{ext}", self.id),
            id,
            name: name.to_string(),
            is_animated: animated,
        };
        assets.push(asset.clone());

        debug!(container_id = %self.id, asset_id = %asset.id, size = data.len(), "Stored asset");

        Ok(asset)
    }

    async fn remove(&self, asset_id: &str) -> AppResult<()> {
        self.lock()?.retain(|a| a.id != asset_id);
        Ok(())
    }
}

/// Fetches assets over HTTP(S).
#[derive(Clone)]
pub struct HttpAssetFetcher {
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("eevee/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> AppResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::Transfer(format!("Failed to fetch {url}: {e}")))?;

        response
            .bytes()
            .await
            .map_err(|e| AppError::Transfer(format!("Failed to read {url}: {e}")))
    }
}
