//! In-memory document backend and periodic task storage.
//!
//! [`InMemoryBackend`] keeps one collection of documents in a
//! `DashMap<String, Document>` keyed by id. Upserts go through the `entry`
//! API, so the insert-or-merge decision and the write happen under the same
//! shard lock.
//!
//! [`InMemoryTaskStorage`] is a thin wrapper around
//! [`GenericTaskStorage<InMemoryBackend>`](crate::store::generic::GenericTaskStorage)
//! with a zero-argument `new()` and a `Default` impl.
//!
//! # Examples
//!
//! ```
//! use periodic_tasks::store::memory::InMemoryTaskStorage;
//! use periodic_tasks::store::StorageConfig;
//!
//! let storage = InMemoryTaskStorage::new().with_config(StorageConfig::default());
//! assert!(storage.backend().is_empty());
//! ```

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::domain::PeriodicTask;
use crate::error::PeriodicTaskError;
use crate::store::backend::{
    apply_set, inserted_document, Document, DocumentBackend, FindOptions, IndexModel,
    StorageError, UpsertOutcome, ID_FIELD,
};
use crate::store::criteria::{Criteria, Filter};
use crate::store::generic::GenericTaskStorage;

use super::{PeriodicTaskStorage, StorageConfig};

// ---- InMemoryBackend: documents in a DashMap ----

/// Thread-safe in-memory document backend.
///
/// Contains **no domain logic**: it never looks at timestamps or record
/// fields except where a [`Filter`] names them.
///
/// # Examples
///
/// ```
/// use periodic_tasks::store::memory::InMemoryBackend;
/// use periodic_tasks::store::generic::GenericTaskStorage;
///
/// let storage = GenericTaskStorage::new(InMemoryBackend::new());
/// assert_eq!(storage.backend().len(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    docs: DashMap<String, Document>,
    indexes: DashMap<String, IndexModel>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns `true` if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Names of the indexes created so far, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn matching(&self, filter: &Filter) -> Vec<(String, Document)> {
        let mut hits: Vec<(String, Document)> = self
            .docs
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        hits
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError> {
        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        Ok(self
            .matching(filter)
            .into_iter()
            .filter(|(id, _)| {
                options
                    .after_id
                    .as_deref()
                    .map_or(true, |after| id.as_str() > after)
            })
            .skip(skip)
            .take(limit)
            .map(|(_, doc)| doc)
            .collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        let n = self
            .docs
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count();
        Ok(n as u64)
    }

    async fn find_one(&self, id: &str) -> Result<Option<Document>, StorageError> {
        Ok(self.docs.get(id).map(|entry| entry.value().clone()))
    }

    async fn upsert(
        &self,
        id: &str,
        mut set: Document,
        set_on_insert: Document,
    ) -> Result<UpsertOutcome, StorageError> {
        set.remove(ID_FIELD);
        match self.docs.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                apply_set(entry.get_mut(), set);
                Ok(UpsertOutcome {
                    matched: true,
                    upserted: false,
                })
            },
            Entry::Vacant(entry) => {
                entry.insert(inserted_document(id, set, set_on_insert));
                Ok(UpsertOutcome {
                    matched: false,
                    upserted: true,
                })
            },
        }
    }

    async fn delete_one(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.docs.remove(id).is_some())
    }

    async fn create_index(&self, index: &IndexModel) -> Result<String, StorageError> {
        match self.indexes.entry(index.name.clone()) {
            Entry::Occupied(existing) if existing.get().keys != index.keys => {
                Err(StorageError::IndexConflict {
                    name: index.name.clone(),
                })
            },
            Entry::Occupied(_) => Ok(index.name.clone()),
            Entry::Vacant(slot) => {
                slot.insert(index.clone());
                Ok(index.name.clone())
            },
        }
    }
}

// ---- InMemoryTaskStorage: thin wrapper around GenericTaskStorage<InMemoryBackend> ----

/// In-memory periodic task storage, for tests and single-process hosts.
#[derive(Debug)]
pub struct InMemoryTaskStorage {
    inner: GenericTaskStorage<InMemoryBackend>,
}

impl InMemoryTaskStorage {
    /// Creates empty storage with [`StorageConfig::default`].
    pub fn new() -> Self {
        Self {
            inner: GenericTaskStorage::new(InMemoryBackend::new()),
        }
    }

    /// Sets the storage configuration.
    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.inner = self.inner.with_config(config);
        self
    }

    /// Returns a reference to the underlying backend.
    pub fn backend(&self) -> &InMemoryBackend {
        self.inner.backend()
    }
}

impl Default for InMemoryTaskStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeriodicTaskStorage for InMemoryTaskStorage {
    async fn find(&self, criteria: &Criteria) -> Result<Vec<PeriodicTask>, PeriodicTaskError> {
        self.inner.find(criteria).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, PeriodicTaskError> {
        self.inner.count(filter).await
    }

    async fn find_by_id(&self, id: &str) -> Result<PeriodicTask, PeriodicTaskError> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, task: &mut PeriodicTask) -> Result<(), PeriodicTaskError> {
        self.inner.save(task).await
    }

    async fn delete(&self, id: &str) -> Result<(), PeriodicTaskError> {
        self.inner.delete(id).await
    }

    async fn provision_indexes(&self, cancel: CancellationToken) -> Result<(), PeriodicTaskError> {
        self.inner.provision_indexes(cancel).await
    }
}
