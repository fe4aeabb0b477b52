//! First-fit placement of new assets across the container pool.
//!
//! Placement is decided under one allocator lock and recorded as a pending
//! [`Reservation`] so that concurrent registrations cannot both claim the last
//! slot of a container. The byte transfer itself runs without the lock. A
//! reservation is consumed by [`CapacityAllocator::transfer`]: once the upload
//! lands, the container's own occupancy accounts for the slot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use eevee_common::{AppError, AppResult};
use futures::future::try_join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::storage::{AssetFetcher, EmoteContainer, HostedAsset, SourceAsset};

type PendingSlots = Arc<std::sync::Mutex<HashMap<(String, bool), usize>>>;

/// A slot claimed in a container but not yet filled.
pub struct Reservation {
    container: Arc<dyn EmoteContainer>,
    animated: bool,
    pending: PendingSlots,
}

impl Reservation {
    /// The container the slot belongs to.
    #[must_use]
    pub fn container_id(&self) -> &str {
        self.container.id()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (self.container.id().to_string(), self.animated);
        if let Some(count) = pending.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                pending.remove(&key);
            }
        }
    }
}

/// Occupancy of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerUsage {
    pub container_id: String,
    pub static_used: usize,
    pub static_capacity: usize,
    pub animated_used: usize,
    pub animated_capacity: usize,
}

/// Allocates container slots for new emotes.
pub struct CapacityAllocator {
    containers: Vec<Arc<dyn EmoteContainer>>,
    fetcher: Arc<dyn AssetFetcher>,
    transfer_timeout: Duration,
    placement: Mutex<()>,
    pending: PendingSlots,
}

impl CapacityAllocator {
    /// Create an allocator over a pool. Pool order is placement order.
    #[must_use]
    pub fn new(
        containers: Vec<Arc<dyn EmoteContainer>>,
        fetcher: Arc<dyn AssetFetcher>,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            containers,
            fetcher,
            transfer_timeout,
            placement: Mutex::new(()),
            pending: PendingSlots::default(),
        }
    }

    /// Look up a container by ID.
    #[must_use]
    pub fn container(&self, id: &str) -> Option<&Arc<dyn EmoteContainer>> {
        self.containers.iter().find(|c| c.id() == id)
    }

    /// Find a pool container already holding `asset_id`.
    pub async fn find_hosted(&self, asset_id: &str) -> AppResult<Option<(String, HostedAsset)>> {
        for container in &self.containers {
            if let Some(asset) = container.find_asset(asset_id).await? {
                return Ok(Some((container.id().to_string(), asset)));
            }
        }
        Ok(None)
    }

    /// Claim a slot in the first container with headroom for the class.
    ///
    /// Returns [`AppError::StorageExhausted`] when every container is full.
    pub async fn reserve(&self, animated: bool) -> AppResult<Reservation> {
        let _placement = self.placement.lock().await;

        for container in &self.containers {
            let used = container.occupancy(animated).await?;
            let key = (container.id().to_string(), animated);

            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let claimed = pending.get(&key).copied().unwrap_or(0);
            if used + claimed < container.capacity().for_class(animated) {
                *pending.entry(key).or_default() += 1;
                debug!(
                    container_id = %container.id(),
                    animated,
                    used,
                    pending = claimed + 1,
                    "Reserved container slot"
                );
                return Ok(Reservation {
                    container: Arc::clone(container),
                    animated,
                    pending: Arc::clone(&self.pending),
                });
            }
        }

        info!(animated, "Every container is full");
        Err(AppError::StorageExhausted)
    }

    /// Fetch the source bytes and upload them into the reserved container.
    ///
    /// The reservation is released when this returns, whatever the outcome.
    /// Any failure, including the transfer timeout, is reported as
    /// [`AppError::Rejected`].
    pub async fn transfer(
        &self,
        reservation: Reservation,
        source: &SourceAsset,
    ) -> AppResult<HostedAsset> {
        let container = Arc::clone(&reservation.container);
        let transfer = async {
            let data = self.fetcher.fetch(&source.url).await?;
            container
                .upload(&source.name, data, reservation.animated)
                .await
        };
        let outcome = tokio::time::timeout(self.transfer_timeout, transfer).await;
        drop(reservation);

        match outcome {
            Ok(Ok(asset)) => {
                info!(
                    container_id = %container.id(),
                    asset_id = %asset.id,
                    source_id = %source.id,
                    "Uploaded asset"
                );
                Ok(asset)
            }
            Ok(Err(e)) => {
                warn!(container_id = %container.id(), source_id = %source.id, error = %e, "Asset transfer failed");
                Err(AppError::Rejected(format!(
                    "Could not copy {} into storage: {e}",
                    source.name
                )))
            }
            Err(_) => {
                warn!(container_id = %container.id(), source_id = %source.id, "Asset transfer timed out");
                Err(AppError::Rejected(format!(
                    "Copying {} timed out after {}s",
                    source.name,
                    self.transfer_timeout.as_secs()
                )))
            }
        }
    }

    /// Best-effort removal of an asset from a pool container.
    pub async fn remove_asset(&self, container_id: &str, asset_id: &str) {
        let Some(container) = self.container(container_id) else {
            warn!(container_id, asset_id, "Asset belongs to an unknown container");
            return;
        };
        match container.remove(asset_id).await {
            Ok(()) => info!(container_id, asset_id, "Removed asset from container"),
            Err(e) => error!(container_id, asset_id, error = %e, "Failed to remove asset"),
        }
    }

    /// Occupancy of every container.
    pub async fn usage(&self) -> AppResult<Vec<ContainerUsage>> {
        try_join_all(self.containers.iter().map(|container| async move {
            let capacity = container.capacity();
            Ok::<_, AppError>(ContainerUsage {
                container_id: container.id().to_string(),
                static_used: container.occupancy(false).await?,
                static_capacity: capacity.static_slots,
                animated_used: container.occupancy(true).await?,
                animated_capacity: capacity.animated_slots,
            })
        }))
        .await
    }
}
