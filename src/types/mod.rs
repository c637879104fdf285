//! Option codec and scheduler-facing configuration types.
//!
//! [`TaskOption`] is the loosely typed `(type, value)` pair stored on a
//! record; [`SchedulerOption`] is its decoded, strongly typed counterpart.
//! [`PeriodicTaskConfig`] is the snapshot entry handed to the scheduler.

pub mod option;
pub mod parse;
pub mod scheduler;

pub use option::*;
pub use scheduler::*;
