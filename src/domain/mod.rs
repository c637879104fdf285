//! Domain types for the persisted task record.
//!
//! [`PeriodicTask`] is the document-shaped representation stored in the
//! backend. Its scheduler-facing projection lives in
//! [`types::scheduler`](crate::types::scheduler).

pub mod record;

pub use record::*;
