//! Configuration entries handed to the external recurring-task scheduler.

use crate::types::option::SchedulerOption;

/// The unit of work the scheduler enqueues on every cron tick.
///
/// # Examples
///
/// ```
/// use periodic_tasks::SchedulerTask;
///
/// let task = SchedulerTask::new("send-email", b"{\"to\":\"ops\"}".to_vec());
/// assert_eq!(task.type_name, "send-email");
/// assert!(!task.payload.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerTask {
    /// Handler identifier (the record's job code).
    pub type_name: String,

    /// Opaque handler input. Empty when the record has no payload.
    pub payload: Vec<u8>,
}

impl SchedulerTask {
    /// Creates a task from a handler identifier and payload.
    pub fn new(type_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            payload,
        }
    }
}

/// One entry of a configuration snapshot: what to enqueue, when, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicTaskConfig {
    /// Cron expression, passed through untouched.
    pub cronspec: String,

    /// Task to enqueue on each tick.
    pub task: SchedulerTask,

    /// Decoded enqueue options, in stored order.
    pub opts: Vec<SchedulerOption>,
}

impl PeriodicTaskConfig {
    /// Returns the first queue option, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use periodic_tasks::{PeriodicTaskConfig, SchedulerOption, SchedulerTask};
    ///
    /// let config = PeriodicTaskConfig {
    ///     cronspec: "@every 1m".to_string(),
    ///     task: SchedulerTask::new("ping", Vec::new()),
    ///     opts: vec![SchedulerOption::Queue("low".to_string())],
    /// };
    /// assert_eq!(config.queue(), Some("low"));
    /// ```
    pub fn queue(&self) -> Option<&str> {
        self.opts.iter().find_map(|opt| match opt {
            SchedulerOption::Queue(name) => Some(name.as_str()),
            _ => None,
        })
    }
}
