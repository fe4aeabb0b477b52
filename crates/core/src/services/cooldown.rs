//! Per-user request cooldown.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

/// Rejects a user's request while their previous successful request is
/// younger than the window. Failed requests do not start a cooldown.
pub struct CooldownGate {
    window: Duration,
    entries: DashMap<String, Instant>,
}

impl CooldownGate {
    /// Create a gate with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    /// The cooldown window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Time left before the user is admitted again, if they are cooling down.
    #[must_use]
    pub fn retry_after(&self, user_id: &str) -> Option<Duration> {
        let stamped = *self.entries.get(user_id)?;
        self.window.checked_sub(stamped.elapsed()).filter(|d| !d.is_zero())
    }

    /// Whether a request from the user may proceed. Has no side effects.
    #[must_use]
    pub fn admit(&self, user_id: &str) -> bool {
        let admitted = self.retry_after(user_id).is_none();
        if !admitted {
            debug!(user_id, "Request rejected by cooldown");
        }
        admitted
    }

    /// Record the outcome of an admitted request.
    pub fn commit(&self, user_id: &str, succeeded: bool) {
        if succeeded {
            self.entries.insert(user_id.to_string(), Instant::now());
        } else {
            self.entries.remove(user_id);
        }
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, stamped| stamped.elapsed() < self.window);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no user is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
