//! Error types for periodic task storage, option decoding, and the service
//! lifecycle.
//!
//! [`PeriodicTaskError`] is what storage and provider callers see. Backend
//! failures pass through it untouched as [`PeriodicTaskError::Storage`], so
//! the original database error stays reachable via
//! [`std::error::Error::source`].

use thiserror::Error;

use crate::store::backend::StorageError;
use crate::types::option::OptionType;

/// An option value that cannot be parsed into its typed scheduler parameter.
///
/// # Examples
///
/// ```
/// use periodic_tasks::{OptionType, TaskOption};
///
/// let err = TaskOption::new(OptionType::Timeout, "soon").decode().unwrap_err();
/// assert_eq!(err.kind, OptionType::Timeout);
/// assert!(err.to_string().contains("soon"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for option {kind}: {reason}")]
pub struct OptionDecodeError {
    /// The option type whose value was rejected.
    pub kind: OptionType,
    /// The raw value as stored.
    pub value: String,
    /// Why parsing failed.
    pub reason: String,
}

/// Errors returned by storage and snapshot operations.
///
/// # Examples
///
/// ```
/// use periodic_tasks::PeriodicTaskError;
///
/// let err = PeriodicTaskError::NotFound { id: "t1".to_string() };
/// assert!(err.is_not_found());
/// assert_eq!(err.to_string(), "periodic task not found: t1");
/// ```
#[derive(Debug, Error)]
pub enum PeriodicTaskError {
    /// No record exists with the requested id.
    #[error("periodic task not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// One of a record's options could not be decoded.
    #[error("periodic task {task_id} has an invalid option: {source}")]
    Decode {
        /// The record carrying the bad option.
        task_id: String,
        /// The decode failure.
        #[source]
        source: OptionDecodeError,
    },

    /// A record could not be converted to or from its document form.
    #[error("periodic task serialization failed: {message}")]
    Serialization {
        /// Description of the conversion failure.
        message: String,
    },

    /// The document backend failed (connectivity, timeout, driver error).
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PeriodicTaskError {
    /// Returns `true` for [`PeriodicTaskError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors surfaced by [`SchedulerStoreService`](crate::service::SchedulerStoreService).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Background index provisioning failed for a reason other than shutdown.
    #[error("index provisioning failed: {0}")]
    IndexProvisioning(#[source] PeriodicTaskError),

    /// `start` was called while the background task is still owned by the service.
    #[error("service already started")]
    AlreadyStarted,

    /// The background task panicked or was aborted before it could finish.
    #[error("background task did not complete: {0}")]
    Join(String),
}
