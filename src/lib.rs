//! Periodic task definitions backed by a document store.
//!
//! This crate persists recurring ("periodic") task definitions and turns the
//! enabled subset into a point-in-time configuration snapshot for an external
//! cron-driven scheduler. The scheduler itself (cron evaluation, dispatch,
//! retries, workers) lives elsewhere; this crate owns the record shape, the
//! storage semantics, and the snapshot assembly.
//!
//! # Overview
//!
//! A [`PeriodicTask`] carries a cron expression, a job code, an optional
//! payload, and an open-ended list of [`TaskOption`]s. Options are loosely
//! typed `(type, value)` pairs that decode into strongly typed
//! [`SchedulerOption`]s when a snapshot is built.
//!
//! Records are stored through [`PeriodicTaskStorage`], whose
//! [`GenericTaskStorage`](store::generic::GenericTaskStorage) implementation
//! owns the upsert timestamp rules on top of any
//! [`DocumentBackend`](store::DocumentBackend).
//!
//! # Module Organization
//!
//! - [`types`] - Option codec and scheduler-facing configuration types
//! - [`domain`] - The persisted [`PeriodicTask`] record
//! - [`store`] - Storage trait, generic storage, and backends
//! - [`provider`] - Snapshot assembly for the scheduler
//! - [`service`] - Start/stop lifecycle with background index provisioning
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use periodic_tasks::provider::{PeriodicTaskConfigProvider, StorageConfigProvider};
//! use periodic_tasks::store::memory::InMemoryTaskStorage;
//! use periodic_tasks::store::PeriodicTaskStorage;
//! use periodic_tasks::{PeriodicTask, TaskOption};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), periodic_tasks::PeriodicTaskError> {
//! let storage: Arc<dyn PeriodicTaskStorage> = Arc::new(InMemoryTaskStorage::new());
//!
//! let mut task = PeriodicTask::new("t1", "*/5 * * * *", "send-email")
//!     .with_opts(vec![TaskOption::queue("critical")])
//!     .with_enabled(true);
//! storage.save(&mut task).await?;
//!
//! let provider = StorageConfigProvider::new(storage);
//! let configs = provider.get_configs().await?;
//! assert_eq!(configs.len(), 1);
//! assert_eq!(configs[0].cronspec, "*/5 * * * *");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod provider;
pub mod service;
pub mod store;
pub mod types;

/// Domain types ([`PeriodicTask`]) for the persisted task record.
pub mod domain;

#[cfg(feature = "logging")]
mod logging;

#[cfg(feature = "logging")]
pub use logging::init_logging;

// Re-exports for ergonomic access
pub use constants::*;
pub use domain::PeriodicTask;
pub use error::{OptionDecodeError, PeriodicTaskError, ServiceError};
pub use types::*;
