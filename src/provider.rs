//! Scheduler configuration snapshots built from stored records.
//!
//! [`StorageConfigProvider`] pages through the enabled records of a
//! [`PeriodicTaskStorage`] and maps each one to a [`PeriodicTaskConfig`].
//! Any fetch or option decode failure aborts the whole snapshot; a partial
//! snapshot is never returned.
//!
//! # Consistency
//!
//! With [`Pagination::Offset`] the snapshot is not isolated from concurrent
//! writes: an insert or delete between page fetches can shift records across
//! page boundaries, so a record may be skipped or returned twice.
//! [`Pagination::Keyset`] resumes after the last id seen instead, which
//! tolerates inserts and deletes but still reads each page at a different
//! moment.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::error::PeriodicTaskError;
use crate::store::{Criteria, PeriodicTaskStorage};
use crate::types::scheduler::PeriodicTaskConfig;

/// Source of scheduler configuration snapshots.
#[async_trait]
pub trait PeriodicTaskConfigProvider: Send + Sync {
    /// Returns one entry per enabled record.
    async fn get_configs(&self) -> Result<Vec<PeriodicTaskConfig>, PeriodicTaskError>;
}

/// How successive pages are requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pagination {
    /// Skip `n * page_size` matching records.
    #[default]
    Offset,
    /// Continue after the last id of the previous page.
    Keyset,
}

impl std::str::FromStr for Pagination {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offset" => Ok(Self::Offset),
            "keyset" => Ok(Self::Keyset),
            other => Err(ConfigError::Invalid(format!(
                "unknown pagination mode {other:?} (expected \"offset\" or \"keyset\")"
            ))),
        }
    }
}

/// Paging parameters for [`StorageConfigProvider`].
///
/// # Examples
///
/// ```
/// use periodic_tasks::provider::{Pagination, ProviderConfig};
///
/// let config = ProviderConfig::default();
/// assert_eq!(config.page_size, 20);
/// assert_eq!(config.pagination, Pagination::Offset);
/// assert!(ProviderConfig { page_size: 0, ..config }.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Records requested per page. Must be positive.
    pub page_size: u64,
    /// Page addressing mode.
    pub pagination: Pagination,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pagination: Pagination::Offset,
        }
    }
}

impl ProviderConfig {
    /// Rejects a zero page size, which would never terminate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builds snapshots from a [`PeriodicTaskStorage`].
///
/// Pages are fetched strictly one after another.
pub struct StorageConfigProvider {
    storage: Arc<dyn PeriodicTaskStorage>,
    config: ProviderConfig,
}

impl std::fmt::Debug for StorageConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfigProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorageConfigProvider {
    /// Creates a provider with [`ProviderConfig::default`].
    pub fn new(storage: Arc<dyn PeriodicTaskStorage>) -> Self {
        Self {
            storage,
            config: ProviderConfig::default(),
        }
    }

    /// Replaces the paging parameters.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `page_size` is zero.
    pub fn with_config(mut self, config: ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Returns the paging parameters.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn page_criteria(&self, index: u64, cursor: Option<&str>) -> Criteria {
        let criteria = Criteria::enabled().with_size(self.config.page_size);
        match (self.config.pagination, cursor) {
            (Pagination::Offset, _) => criteria.with_index(index),
            (Pagination::Keyset, Some(last_id)) => criteria.after(last_id),
            (Pagination::Keyset, None) => criteria,
        }
    }
}

#[async_trait]
impl PeriodicTaskConfigProvider for StorageConfigProvider {
    async fn get_configs(&self) -> Result<Vec<PeriodicTaskConfig>, PeriodicTaskError> {
        let page_size = self.config.page_size;
        let mut configs = Vec::new();
        let mut index = 0u64;
        let mut cursor: Option<String> = None;

        loop {
            let criteria = self.page_criteria(index, cursor.as_deref());
            let page = self.storage.find(&criteria).await?;
            let returned = page.len() as u64;
            tracing::debug!(index, page_size, returned, "fetched periodic task page");

            if let Some(last) = page.last() {
                cursor = Some(last.id.clone());
            }

            for task in page.iter().filter(|task| task.is_active()) {
                let config = task.to_config().inspect_err(|e| {
                    tracing::warn!(task_id = %task.id, error = %e, "invalid periodic task option");
                })?;
                configs.push(config);
            }

            if returned < page_size {
                break;
            }
            index += page_size;
        }

        tracing::debug!(count = configs.len(), "built periodic task snapshot");
        Ok(configs)
    }
}
