//! Generic periodic task storage with all domain logic delegating to a
//! [`DocumentBackend`].
//!
//! [`GenericTaskStorage`] converts records to and from documents, applies the
//! upsert timestamp rules, maps missing documents to
//! [`PeriodicTaskError::NotFound`], and bounds index provisioning by a
//! timeout and a cancellation token. Backends stay dumb document stores.
//!
//! # Upsert Semantics
//!
//! `save` sends every present field except `id` and `created_at` as the
//! merge set and `created_at = now` as the insert-only set. The backend
//! reports whether it inserted, and only then is `created_at` written back
//! into the caller's record.

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::constants::{LOOKUP_INDEX_FIELDS, LOOKUP_INDEX_NAME};
use crate::domain::PeriodicTask;
use crate::error::PeriodicTaskError;
use crate::store::backend::{
    Document, DocumentBackend, FindOptions, IndexModel, StorageError, ID_FIELD,
};
use crate::store::criteria::{Criteria, Filter};
use crate::store::StorageConfig;

/// Periodic task storage over any [`DocumentBackend`].
///
/// # Type Parameters
///
/// * `B` - A [`DocumentBackend`] implementation (in-memory, Redis, etc.)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use periodic_tasks::store::generic::GenericTaskStorage;
/// use periodic_tasks::store::memory::InMemoryBackend;
/// use periodic_tasks::store::StorageConfig;
///
/// let storage = GenericTaskStorage::new(InMemoryBackend::new()).with_config(StorageConfig {
///     collection: "jobs".to_string(),
///     index_timeout: Duration::from_secs(2),
/// });
/// assert_eq!(storage.config().collection, "jobs");
/// ```
#[derive(Debug)]
pub struct GenericTaskStorage<B: DocumentBackend> {
    backend: B,
    config: StorageConfig,
}

impl<B: DocumentBackend> GenericTaskStorage<B> {
    /// Creates storage over the given backend with [`StorageConfig::default`].
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: StorageConfig::default(),
        }
    }

    /// Sets the storage configuration.
    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    // ---- Document conversion (private) ----

    fn to_document(task: &PeriodicTask) -> Result<Document, PeriodicTaskError> {
        match serde_json::to_value(task) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(other) => Err(PeriodicTaskError::Serialization {
                message: format!("periodic task serialized to a non-object: {other}"),
            }),
            Err(e) => Err(PeriodicTaskError::Serialization {
                message: format!("failed to serialize periodic task {}: {e}", task.id),
            }),
        }
    }

    fn from_document(doc: Document) -> Result<PeriodicTask, PeriodicTaskError> {
        serde_json::from_value(Value::Object(doc)).map_err(|e| PeriodicTaskError::Serialization {
            message: format!("failed to deserialize periodic task: {e}"),
        })
    }

    // ---- Domain operations (public) ----

    /// Returns the records matching `criteria`, ascending by id.
    pub async fn find(&self, criteria: &Criteria) -> Result<Vec<PeriodicTask>, PeriodicTaskError> {
        let options = FindOptions {
            skip: criteria.index,
            limit: criteria.size,
            after_id: criteria.after_id.clone(),
        };
        let docs = self.backend.find(&criteria.filter, &options).await?;
        docs.into_iter().map(Self::from_document).collect()
    }

    /// Counts records matching `filter`.
    pub async fn count(&self, filter: &Filter) -> Result<u64, PeriodicTaskError> {
        Ok(self.backend.count(filter).await?)
    }

    /// Fetches one record by id, or [`PeriodicTaskError::NotFound`].
    pub async fn find_by_id(&self, id: &str) -> Result<PeriodicTask, PeriodicTaskError> {
        match self.backend.find_one(id).await? {
            Some(doc) => Self::from_document(doc),
            None => Err(PeriodicTaskError::NotFound { id: id.to_string() }),
        }
    }

    /// Inserts or merges `task` by id and reflects the written timestamps
    /// back into it.
    pub async fn save(&self, task: &mut PeriodicTask) -> Result<(), PeriodicTaskError> {
        let now = Utc::now();

        let mut staged = task.clone();
        staged.updated_at = Some(now);
        staged.created_at = None;
        let mut set = Self::to_document(&staged)?;
        set.remove(ID_FIELD);

        let mut set_on_insert = Document::new();
        set_on_insert.insert(
            "created_at".to_string(),
            serde_json::to_value(now).map_err(|e| PeriodicTaskError::Serialization {
                message: format!("failed to serialize timestamp: {e}"),
            })?,
        );

        let outcome = self.backend.upsert(&task.id, set, set_on_insert).await?;

        task.updated_at = Some(now);
        if outcome.upserted {
            task.created_at = Some(now);
        }

        tracing::debug!(
            task_id = %task.id,
            collection = %self.config.collection,
            inserted = outcome.upserted,
            "saved periodic task"
        );
        Ok(())
    }

    /// Deletes a record by id, or returns [`PeriodicTaskError::NotFound`].
    pub async fn delete(&self, id: &str) -> Result<(), PeriodicTaskError> {
        if self.backend.delete_one(id).await? {
            Ok(())
        } else {
            Err(PeriodicTaskError::NotFound { id: id.to_string() })
        }
    }

    /// Ensures the compound lookup index exists.
    ///
    /// Cancellation wins over an in-flight creation and is not an error.
    /// A creation that outlives [`StorageConfig::index_timeout`] fails with
    /// a backend error carrying the elapsed timer as its source.
    pub async fn provision_indexes(
        &self,
        cancel: CancellationToken,
    ) -> Result<(), PeriodicTaskError> {
        let index = IndexModel::ascending(LOOKUP_INDEX_NAME, LOOKUP_INDEX_FIELDS);
        let timeout = self.config.index_timeout;

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(index = %index.name, "index provisioning cancelled");
                Ok(())
            },
            result = tokio::time::timeout(timeout, self.backend.create_index(&index)) => {
                match result {
                    Ok(Ok(name)) => {
                        tracing::debug!(
                            index = %name,
                            collection = %self.config.collection,
                            "lookup index provisioned"
                        );
                        Ok(())
                    },
                    Ok(Err(e)) => Err(e.into()),
                    Err(elapsed) => Err(StorageError::Backend {
                        message: format!(
                            "creating index {} timed out after {}ms",
                            index.name,
                            timeout.as_millis()
                        ),
                        source: Some(Box::new(elapsed)),
                    }
                    .into()),
                }
            },
        }
    }

    /// Returns the storage configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
