//! Allow-list, deny-list and ownership.
//!
//! Invariants kept by every operation: at most one allow-list entry is the
//! owner, and no user is on both lists. Operations are serialized by the
//! ledger lock; each store update touching both lists is one transaction.

use eevee_common::{AppError, AppResult};
use eevee_db::{
    entities::{allowlist, denylist},
    repositories::AccessListRepository,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A user as seen by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub is_bot: bool,
}

impl Principal {
    /// A human user.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_bot: false,
        }
    }

    /// A bot account.
    #[must_use]
    pub fn bot(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_bot: true,
        }
    }
}

/// Permission a command requires from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// No requirement.
    Anyone,
    /// Caller must be on the allow-list.
    Allowed,
    /// Caller must be the owner.
    Owner,
}

/// Access-control ledger.
pub struct AccessLedger {
    repo: AccessListRepository,
    guard: Mutex<()>,
}

impl AccessLedger {
    /// Create a new ledger.
    #[must_use]
    pub fn new(repo: AccessListRepository) -> Self {
        Self {
            repo,
            guard: Mutex::new(()),
        }
    }

    // ==================== Queries ====================

    /// Whether the user is on the allow-list.
    pub async fn is_allowed(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.repo.find_allowed(user_id).await?.is_some())
    }

    /// Whether the user is on the deny-list.
    pub async fn is_denied(&self, user_id: &str) -> AppResult<bool> {
        self.repo.is_denied(user_id).await
    }

    /// Whether the user is the owner.
    pub async fn is_owner(&self, user_id: &str) -> AppResult<bool> {
        Ok(self
            .repo
            .find_allowed(user_id)
            .await?
            .is_some_and(|entry| entry.is_owner))
    }

    /// Whether anybody owns the bot.
    pub async fn has_owner(&self) -> AppResult<bool> {
        Ok(self.repo.find_owner().await?.is_some())
    }

    /// Whether the user may transfer ownership: they own the bot, or nobody
    /// does.
    pub async fn can_change_owner(&self, user_id: &str) -> AppResult<bool> {
        match self.repo.find_owner().await? {
            Some(owner) => Ok(owner.id == user_id),
            None => Ok(true),
        }
    }

    /// The allow-list, owner first.
    pub async fn allowlist(&self) -> AppResult<Vec<allowlist::Model>> {
        self.repo.list_allowed().await
    }

    /// The deny-list.
    pub async fn denylist(&self) -> AppResult<Vec<denylist::Model>> {
        self.repo.list_denied().await
    }

    /// Check a capability for a user.
    pub async fn authorize(&self, user_id: &str, capability: Capability) -> AppResult<()> {
        match capability {
            Capability::Anyone => Ok(()),
            Capability::Allowed if self.is_allowed(user_id).await? => Ok(()),
            Capability::Allowed => Err(AppError::NotAllowed),
            Capability::Owner if self.is_owner(user_id).await? => Ok(()),
            Capability::Owner => Err(AppError::NotOwner),
        }
    }

    // ==================== Mutations ====================

    /// Allow-list `target`.
    ///
    /// The caller must be allowed, except while the allow-list is empty. The
    /// first entry ever created becomes the owner.
    pub async fn add_allowed(&self, caller_id: &str, target: &Principal) -> AppResult<()> {
        if target.is_bot {
            return Err(AppError::BotUserRejected);
        }

        let _guard = self.guard.lock().await;

        let count = self.repo.count_allowed().await?;
        if count > 0 && !self.is_allowed(caller_id).await? {
            return Err(AppError::NotAllowed);
        }

        let is_owner = count == 0;
        self.repo.allow(&target.id, is_owner).await?;

        info!(caller_id, target_id = %target.id, is_owner, "User allow-listed");
        Ok(())
    }

    /// Deny-list `target`. The caller must be allowed; the owner cannot be
    /// denied.
    pub async fn add_denied(&self, caller_id: &str, target: &Principal) -> AppResult<()> {
        if target.is_bot {
            return Err(AppError::BotUserRejected);
        }

        let _guard = self.guard.lock().await;

        if !self.is_allowed(caller_id).await? {
            return Err(AppError::NotAllowed);
        }
        if self.is_owner(&target.id).await? {
            return Err(AppError::Rejected("The owner cannot be deny-listed".to_string()));
        }

        self.repo.deny(&target.id).await?;

        info!(caller_id, target_id = %target.id, "User deny-listed");
        Ok(())
    }

    /// Remove `target_id` from the allow-list. Users may remove themselves;
    /// removing anybody else takes the owner.
    pub async fn remove_allowed(&self, caller_id: &str, target_id: &str) -> AppResult<()> {
        let _guard = self.guard.lock().await;

        if caller_id != target_id && !self.is_owner(caller_id).await? {
            return Err(AppError::NotOwner);
        }

        if !self.repo.remove_allowed(target_id).await? {
            return Err(AppError::NotFound(format!("{target_id} is not allow-listed")));
        }

        info!(caller_id, target_id, "User removed from allow-list");
        Ok(())
    }

    /// Remove `target_id` from the deny-list. Owner only.
    pub async fn remove_denied(&self, caller_id: &str, target_id: &str) -> AppResult<()> {
        let _guard = self.guard.lock().await;

        if !self.is_owner(caller_id).await? {
            return Err(AppError::NotOwner);
        }

        if !self.repo.remove_denied(target_id).await? {
            return Err(AppError::NotFound(format!("{target_id} is not deny-listed")));
        }

        info!(caller_id, target_id, "User removed from deny-list");
        Ok(())
    }

    /// Hand ownership to `target`.
    ///
    /// While nobody owns the bot a user may claim ownership for themselves.
    /// Otherwise only the owner may hand it to somebody else.
    pub async fn transfer_ownership(&self, caller_id: &str, target: &Principal) -> AppResult<()> {
        if target.is_bot {
            return Err(AppError::BotUserRejected);
        }

        let _guard = self.guard.lock().await;

        match self.repo.find_owner().await? {
            None if caller_id == target.id => {
                self.repo.claim_owner(caller_id).await?;
                info!(owner_id = caller_id, "Ownership claimed");
                Ok(())
            }
            None => Err(AppError::NotOwner),
            Some(owner) if owner.id != caller_id => Err(AppError::NotOwner),
            Some(_) if caller_id == target.id => {
                debug!(caller_id, "Ownership transfer to self ignored");
                Err(AppError::Rejected("You already own the bot".to_string()))
            }
            Some(_) => {
                self.repo.transfer_owner(caller_id, &target.id).await?;
                info!(from = caller_id, to = %target.id, "Ownership transferred");
                Ok(())
            }
        }
    }
}
