//! Document backend trait and supporting types.
//!
//! The [`DocumentBackend`] trait describes the slice of a document database
//! this crate relies on: one collection, keyed by the `id` field, with
//! filtered finds, counts, point lookups, an atomic upsert, deletes, and
//! index creation.
//!
//! Domain logic (timestamp rules, record (de)serialization, `NotFound`
//! semantics) does **not** belong here. Backends move documents; the rules
//! live in [`GenericTaskStorage`](crate::store::generic::GenericTaskStorage).
//!
//! # Upsert
//!
//! [`upsert`](DocumentBackend::upsert) mirrors a `$set` / `$setOnInsert`
//! update with `upsert: true`. The backend, not the caller, decides whether
//! the document existed, and that decision must be atomic with the write.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::store::criteria::Filter;

/// A stored document: a JSON object whose `id` field is the primary key.
pub type Document = Map<String, Value>;

/// Name of the primary key field in every document.
pub const ID_FIELD: &str = "id";

/// Sort direction of one index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

/// Definition of a (possibly compound) secondary index.
///
/// # Examples
///
/// ```
/// use periodic_tasks::store::backend::{IndexDirection, IndexModel};
///
/// let index = IndexModel::ascending("by_job", ["job_code", "enabled"]);
/// assert_eq!(index.keys.len(), 2);
/// assert_eq!(index.keys[0], ("job_code".to_string(), IndexDirection::Ascending));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    /// Index name; creating the same name twice with the same keys is a no-op.
    pub name: String,
    /// Keys in index order.
    pub keys: Vec<(String, IndexDirection)>,
}

impl IndexModel {
    /// Creates an index with every key ascending.
    pub fn ascending<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keys: fields
                .into_iter()
                .map(|field| (field.into(), IndexDirection::Ascending))
                .collect(),
        }
    }
}

/// Windowing for [`DocumentBackend::find`]. Results are always ordered
/// ascending by `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Matching documents to skip.
    pub skip: u64,
    /// Maximum documents to return; `None` is unbounded.
    pub limit: Option<u64>,
    /// Only documents whose `id` is strictly greater.
    pub after_id: Option<String>,
}

/// What an [`upsert`](DocumentBackend::upsert) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// An existing document matched the id.
    pub matched: bool,
    /// A new document was inserted.
    pub upserted: bool,
}

/// Errors raised by a document backend.
///
/// `GenericTaskStorage` passes these through to callers unchanged inside
/// [`PeriodicTaskError::Storage`](crate::error::PeriodicTaskError::Storage).
///
/// # Examples
///
/// ```
/// use periodic_tasks::store::backend::StorageError;
///
/// let err = StorageError::IndexConflict { name: "by_job".to_string() };
/// assert!(err.to_string().contains("by_job"));
/// ```
#[derive(Debug)]
pub enum StorageError {
    /// An index with the same name but different keys already exists.
    IndexConflict {
        /// The conflicting index name.
        name: String,
    },

    /// An I/O or backend-specific error occurred (network failure,
    /// database timeout, malformed stored data).
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available. Accessible via
        /// [`std::error::Error::source()`].
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexConflict { name } => {
                write!(f, "index {name} already exists with different keys")
            },
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// One collection of a document database.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; storage handles are shared across
/// the provider, the service's background task, and host callers.
///
/// # No Domain Logic
///
/// Backends never interpret record fields beyond `id` and the fields a
/// [`Filter`] names. Timestamp rules belong in `GenericTaskStorage`.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Returns documents matching `filter`, ordered ascending by `id`,
    /// windowed by `options`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError>;

    /// Counts documents matching `filter`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn count(&self, filter: &Filter) -> Result<u64, StorageError>;

    /// Returns the document with the given id, if any.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn find_one(&self, id: &str) -> Result<Option<Document>, StorageError>;

    /// Atomically merges `set` into the document with the given id, or
    /// inserts `{id} + set + set_on_insert` when no such document exists.
    ///
    /// Only top-level fields named in `set` are replaced; other stored
    /// fields are left untouched.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn upsert(
        &self,
        id: &str,
        set: Document,
        set_on_insert: Document,
    ) -> Result<UpsertOutcome, StorageError>;

    /// Deletes the document with the given id. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn delete_one(&self, id: &str) -> Result<bool, StorageError>;

    /// Creates an index, returning its name. Creating an identical index
    /// again succeeds without change.
    ///
    /// # Errors
    ///
    /// - [`StorageError::IndexConflict`] if the name is taken by different keys.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn create_index(&self, index: &IndexModel) -> Result<String, StorageError>;

    /// Binds the backend to the named collection.
    ///
    /// Backends that hold exactly one collection per instance keep this
    /// default, which ignores the name.
    fn for_collection(self, collection: &str) -> Self
    where
        Self: Sized,
    {
        let _ = collection;
        self
    }
}

/// Applies `$set` semantics: every top-level field in `set` replaces the
/// stored one.
///
/// # Examples
///
/// ```
/// use periodic_tasks::store::backend::apply_set;
/// use serde_json::json;
///
/// let mut doc = json!({"id": "t1", "enabled": true, "job_code": "a"})
///     .as_object().cloned().unwrap();
/// let set = json!({"job_code": "b"}).as_object().cloned().unwrap();
/// apply_set(&mut doc, set);
/// assert_eq!(doc["job_code"], "b");
/// assert_eq!(doc["enabled"], true);
/// ```
pub fn apply_set(doc: &mut Document, set: Document) {
    for (field, value) in set {
        doc.insert(field, value);
    }
}

/// Builds the document inserted by an upsert that matched nothing.
pub fn inserted_document(id: &str, set: Document, set_on_insert: Document) -> Document {
    let mut doc = Document::new();
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    apply_set(&mut doc, set);
    apply_set(&mut doc, set_on_insert);
    doc
}
