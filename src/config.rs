//! Service configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`.periodic-tasks.toml`)
//! 2. Environment variables (with `PERIODIC_TASKS_` prefix)
//!
//! Environment variables override TOML configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [scheduler_store]
//! collection = "scheduler"
//! page_size = 20
//! pagination = "offset"
//! index_timeout_ms = 10000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_COLLECTION, DEFAULT_INDEX_TIMEOUT_MS, DEFAULT_PAGE_SIZE};
use crate::provider::{Pagination, ProviderConfig};
use crate::store::StorageConfig;

/// Default configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = ".periodic-tasks.toml";

const ENV_COLLECTION: &str = "PERIODIC_TASKS_COLLECTION";
const ENV_PAGE_SIZE: &str = "PERIODIC_TASKS_PAGE_SIZE";
const ENV_PAGINATION: &str = "PERIODIC_TASKS_PAGINATION";
const ENV_INDEX_TIMEOUT_MS: &str = "PERIODIC_TASKS_INDEX_TIMEOUT_MS";

/// Configuration for [`SchedulerStoreService`](crate::service::SchedulerStoreService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Collection holding the periodic task documents.
    pub collection: String,

    /// Records per page when building a snapshot.
    pub page_size: u64,

    /// Page addressing mode.
    pub pagination: Pagination,

    /// Upper bound on index provisioning, in milliseconds.
    pub index_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            pagination: Pagination::Offset,
            index_timeout_ms: DEFAULT_INDEX_TIMEOUT_MS,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. `.periodic-tasks.toml` in the working directory
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(contents) => Self::parse_toml(&contents)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, then apply environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::parse_toml(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML content (the `[scheduler_store]` table).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct FullConfig {
            #[serde(default)]
            scheduler_store: ServiceConfig,
        }

        let full: FullConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(full.scheduler_store)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparsable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(collection) = lookup(ENV_COLLECTION) {
            self.collection = collection;
        }

        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            match raw.trim().parse() {
                Ok(v) => self.page_size = v,
                Err(_) => tracing::warn!(var = ENV_PAGE_SIZE, value = %raw, "ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_PAGINATION) {
            match raw.parse() {
                Ok(v) => self.pagination = v,
                Err(_) => tracing::warn!(var = ENV_PAGINATION, value = %raw, "ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_INDEX_TIMEOUT_MS) {
            match raw.trim().parse() {
                Ok(v) => self.index_timeout_ms = v,
                Err(_) => {
                    tracing::warn!(var = ENV_INDEX_TIMEOUT_MS, value = %raw, "ignoring invalid override");
                },
            }
        }
    }

    /// Checks invariants the rest of the crate relies on.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero page size, a zero index timeout,
    /// or an empty collection name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider_config().validate()?;
        if self.index_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "index_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "collection must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Paging parameters for the snapshot provider.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            page_size: self.page_size,
            pagination: self.pagination,
        }
    }

    /// Settings for the storage layer.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            collection: self.collection.clone(),
            index_timeout: Duration::from_millis(self.index_timeout_ms),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading a configuration file.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the configuration file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
