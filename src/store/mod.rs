//! Periodic task storage trait, generic implementation, and backends.
//!
//! # Architecture
//!
//! Storage has three layers:
//!
//! 1. **[`PeriodicTaskStorage`]** -- The object-safe interface handed out as
//!    `Arc<dyn PeriodicTaskStorage>` by the
//!    [`SchedulerStoreService`](crate::service::SchedulerStoreService) and
//!    consumed by the [`StorageConfigProvider`](crate::provider::StorageConfigProvider).
//!
//! 2. **[`GenericTaskStorage<B>`](generic::GenericTaskStorage)** -- All domain
//!    logic (record/document conversion, upsert timestamp rules, `NotFound`
//!    mapping, bounded index provisioning). Has a blanket
//!    `PeriodicTaskStorage` impl.
//!
//! 3. **[`DocumentBackend`]** -- One collection of a document database.
//!    No domain logic.
//!
//! # Backends
//!
//! - [`InMemoryBackend`](memory::InMemoryBackend) -- `DashMap` documents with
//!   per-key atomic upserts. Wrapped by
//!   [`InMemoryTaskStorage`](memory::InMemoryTaskStorage).
//! - [`RedisBackend`](redis::RedisBackend) -- Lua-scripted upserts over JSON
//!   documents. Available behind the `redis` feature flag.

pub mod backend;
pub mod criteria;
pub mod generic;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use backend::{Document, DocumentBackend, StorageError};
pub use criteria::{Condition, Criteria, FieldFilter, Filter};

use crate::constants::{DEFAULT_COLLECTION, DEFAULT_INDEX_TIMEOUT_MS};
use crate::domain::PeriodicTask;
use crate::error::PeriodicTaskError;

/// Settings shared by every storage backend.
///
/// # Defaults
///
/// | Setting         | Default       | Description                                  |
/// |-----------------|---------------|----------------------------------------------|
/// | `collection`    | `"scheduler"` | Collection (or key prefix) holding records   |
/// | `index_timeout` | 10 s          | Upper bound on one index creation round trip |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use periodic_tasks::store::StorageConfig;
///
/// let config = StorageConfig::default();
/// assert_eq!(config.collection, "scheduler");
/// assert_eq!(config.index_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Collection name; backends use it as a table name or key prefix.
    pub collection: String,
    /// Timeout for [`PeriodicTaskStorage::provision_indexes`].
    pub index_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            index_timeout: Duration::from_millis(DEFAULT_INDEX_TIMEOUT_MS),
        }
    }
}

/// Persistent storage for periodic task records.
///
/// All domain rules live in
/// [`GenericTaskStorage`](generic::GenericTaskStorage); a blanket impl is
/// provided for it over any [`DocumentBackend`].
///
/// # Errors
///
/// Database failures surface unchanged as [`PeriodicTaskError::Storage`].
/// A missing record is [`PeriodicTaskError::NotFound`], which is never
/// produced by [`save`](Self::save).
#[async_trait]
pub trait PeriodicTaskStorage: Send + Sync {
    /// Returns the records matching `criteria`, ascending by id.
    async fn find(&self, criteria: &Criteria) -> Result<Vec<PeriodicTask>, PeriodicTaskError>;

    /// Counts records matching `filter`.
    async fn count(&self, filter: &Filter) -> Result<u64, PeriodicTaskError>;

    /// Fetches one record by id.
    ///
    /// # Errors
    ///
    /// [`PeriodicTaskError::NotFound`] if no record has this id.
    async fn find_by_id(&self, id: &str) -> Result<PeriodicTask, PeriodicTaskError>;

    /// Inserts or merges the record, keyed by its id.
    ///
    /// Present fields replace stored ones; absent optional fields leave the
    /// stored values untouched. `created_at` is written only on insert and
    /// `updated_at` on every call.
    ///
    /// `task.updated_at` is always set to the write time. `task.created_at`
    /// is set only when this call inserted the record; on an update it keeps
    /// whatever the caller passed in, which may be `None`.
    async fn save(&self, task: &mut PeriodicTask) -> Result<(), PeriodicTaskError>;

    /// Removes a record by id.
    ///
    /// # Errors
    ///
    /// [`PeriodicTaskError::NotFound`] if no record has this id.
    async fn delete(&self, id: &str) -> Result<(), PeriodicTaskError>;

    /// Ensures the lookup index exists. Safe to call repeatedly.
    ///
    /// Returns `Ok(())` without error when `cancel` fires first.
    async fn provision_indexes(&self, cancel: CancellationToken) -> Result<(), PeriodicTaskError>;
}

// ---- Blanket impl for GenericTaskStorage<B> ----

#[async_trait]
impl<B: DocumentBackend + 'static> PeriodicTaskStorage for generic::GenericTaskStorage<B> {
    async fn find(&self, criteria: &Criteria) -> Result<Vec<PeriodicTask>, PeriodicTaskError> {
        generic::GenericTaskStorage::find(self, criteria).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, PeriodicTaskError> {
        generic::GenericTaskStorage::count(self, filter).await
    }

    async fn find_by_id(&self, id: &str) -> Result<PeriodicTask, PeriodicTaskError> {
        generic::GenericTaskStorage::find_by_id(self, id).await
    }

    async fn save(&self, task: &mut PeriodicTask) -> Result<(), PeriodicTaskError> {
        generic::GenericTaskStorage::save(self, task).await
    }

    async fn delete(&self, id: &str) -> Result<(), PeriodicTaskError> {
        generic::GenericTaskStorage::delete(self, id).await
    }

    async fn provision_indexes(&self, cancel: CancellationToken) -> Result<(), PeriodicTaskError> {
        generic::GenericTaskStorage::provision_indexes(self, cancel).await
    }
}
