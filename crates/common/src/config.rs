//! Application configuration.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Registry limits and timings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Storage container pool, in placement order.
    #[serde(default)]
    pub containers: Vec<ContainerConfig>,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Registry limits and timings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Shortest accepted alias.
    #[serde(default = "default_min_alias_length")]
    pub min_alias_length: usize,
    /// Longest accepted alias.
    #[serde(default = "default_max_alias_length")]
    pub max_alias_length: usize,
    /// Aliases a user may already hold on one emote when adding another.
    #[serde(default = "default_max_aliases")]
    pub max_aliases_per_user_per_emote: usize,
    /// Per-user cooldown between admitted requests, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Upper bound on a single asset fetch-and-upload, in seconds.
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            min_alias_length: default_min_alias_length(),
            max_alias_length: default_max_alias_length(),
            max_aliases_per_user_per_emote: default_max_aliases(),
            cooldown_secs: default_cooldown_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

impl RegistryConfig {
    /// Cooldown window as a [`Duration`].
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Transfer timeout as a [`Duration`].
    #[must_use]
    pub const fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }
}

/// A storage container in the placement pool.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    /// Container identifier on the chat platform.
    pub id: String,
    /// Ceiling for static assets.
    #[serde(default = "default_container_capacity")]
    pub static_capacity: usize,
    /// Ceiling for animated assets.
    #[serde(default = "default_container_capacity")]
    pub animated_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_min_connections() -> u32 {
    1
}

const fn default_min_alias_length() -> usize {
    2
}

const fn default_max_alias_length() -> usize {
    32
}

const fn default_max_aliases() -> usize {
    2
}

const fn default_cooldown_secs() -> u64 {
    3
}

const fn default_transfer_timeout_secs() -> u64 {
    15
}

const fn default_container_capacity() -> usize {
    50
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `EEVEE_ENV`)
    /// 3. Environment variables with `EEVEE__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("EEVEE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("EEVEE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("EEVEE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        if self.containers.is_empty() {
            return Err(AppError::Config(
                "at least one storage container is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for container in &self.containers {
            if !seen.insert(container.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate storage container: {}",
                    container.id
                )));
            }
        }

        let registry = &self.registry;
        if registry.min_alias_length == 0 || registry.min_alias_length > registry.max_alias_length
        {
            return Err(AppError::Config(format!(
                "invalid alias length bounds: {}..={}",
                registry.min_alias_length, registry.max_alias_length
            )));
        }

        Ok(())
    }
}
