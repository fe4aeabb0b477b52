//! Error types for eevee-rs.

use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// The first group of variants are expected outcomes of registry and
/// access-control operations and are handed back to the command layer as-is.
/// The second group are infrastructure faults.
#[derive(Debug, Error)]
pub enum AppError {
    // === Registry Outcomes ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Too short: must be at least {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Too long: must be at most {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("Alias limit of {limit} reached; current aliases: {}", .aliases.join(", "))]
    CapacityExceeded { limit: usize, aliases: Vec<String> },

    #[error("{0}")]
    Rejected(String),

    #[error("Storage exhausted: every container is full")]
    StorageExhausted,

    // === Access Control ===
    #[error("Not allowed: caller is not on the allow-list")]
    NotAllowed,

    #[error("Not owner: caller does not hold ownership")]
    NotOwner,

    #[error("Bot accounts cannot be listed")]
    BotUserRejected,

    #[error("Cooling down: retry in {retry_after_ms}ms")]
    CoolingDown { retry_after_ms: u64 },

    // === Infrastructure ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code handed to the command layer.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::TooShort { .. } => "TOO_SHORT",
            Self::TooLong { .. } => "TOO_LONG",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::Rejected(_) => "REJECTED",
            Self::StorageExhausted => "STORAGE_EXHAUSTED",
            Self::NotAllowed => "NOT_ALLOWED",
            Self::NotOwner => "NOT_OWNER",
            Self::BotUserRejected => "BOT_USER_REJECTED",
            Self::CoolingDown { .. } => "COOLING_DOWN",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Transfer(_) => "TRANSFER_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error is an expected, user-facing outcome rather
    /// than an infrastructure fault.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Storage(_)
                | Self::Transfer(_)
                | Self::Config(_)
                | Self::Internal(_)
        )
    }

    /// Serialize into the payload shape consumed by the command layer.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        let code = self.error_code();

        if self.is_recoverable() {
            tracing::debug!(error = %self, code = code, "Registry rejected request");
        } else {
            tracing::error!(error = %self, code = code, "Registry fault");
        }

        let mut body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        if let Self::CapacityExceeded { aliases, .. } = self {
            body["error"]["aliases"] = json!(aliases);
        }

        body
    }
}

// === From implementations ===

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
