//! Periodic task record -- the stored definition of a recurring task.
//!
//! Optional fields are genuinely tri-state: `None` means "never specified"
//! and is omitted from the stored document, which is distinct from an
//! explicit empty list or an explicit `false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PeriodicTaskError;
use crate::types::option::{SchedulerOption, TaskOption};
use crate::types::scheduler::{PeriodicTaskConfig, SchedulerTask};

/// A recurring task definition.
///
/// The `id` is assigned by the caller and never generated by storage.
/// `created_at` and `updated_at` are owned by
/// [`PeriodicTaskStorage::save`](crate::store::PeriodicTaskStorage::save);
/// values set by the caller are ignored on write.
///
/// # Examples
///
/// ```
/// use periodic_tasks::{PeriodicTask, TaskOption};
///
/// let task = PeriodicTask::new("nightly-report", "0 3 * * *", "report:build")
///     .with_payload(b"{\"format\":\"pdf\"}".to_vec())
///     .with_opts(vec![TaskOption::queue("reports")])
///     .with_enabled(true);
///
/// assert!(task.is_active());
/// assert!(task.has_opts());
/// assert_eq!(task.task().type_name, "report:build");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicTask {
    /// Caller-assigned primary key.
    pub id: String,

    /// Cron expression, interpreted only by the scheduler.
    #[serde(default)]
    pub cron_expr: String,

    /// Handler identifier the scheduler invokes.
    #[serde(default)]
    pub job_code: String,

    /// Opaque handler input, stored base64-encoded.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "payload_base64"
    )]
    pub payload: Option<Vec<u8>>,

    /// Enqueue options. `None` means no options were specified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<Vec<TaskOption>>,

    /// Set once, on first persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Refreshed by every successful save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Only `Some(true)` makes the task active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl PeriodicTask {
    /// Creates a record with no payload, no options, and no enabled flag.
    pub fn new(
        id: impl Into<String>,
        cron_expr: impl Into<String>,
        job_code: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            cron_expr: cron_expr.into(),
            job_code: job_code.into(),
            payload: None,
            opts: None,
            created_at: None,
            updated_at: None,
            enabled: None,
        }
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the option list (an empty list is kept as explicitly empty).
    pub fn with_opts(mut self, opts: Vec<TaskOption>) -> Self {
        self.opts = Some(opts);
        self
    }

    /// Sets the enabled flag explicitly.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Returns `true` if an option list was specified, even an empty one.
    pub fn has_opts(&self) -> bool {
        self.opts.is_some()
    }

    /// Returns `true` only when `enabled` is explicitly `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// use periodic_tasks::PeriodicTask;
    ///
    /// let task = PeriodicTask::new("t", "* * * * *", "noop");
    /// assert!(!task.is_active());
    /// assert!(!task.clone().with_enabled(false).is_active());
    /// assert!(task.with_enabled(true).is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        self.enabled == Some(true)
    }

    /// The task the scheduler enqueues; an absent payload becomes empty.
    pub fn task(&self) -> SchedulerTask {
        SchedulerTask::new(
            self.job_code.clone(),
            self.payload.clone().unwrap_or_default(),
        )
    }

    /// Decodes every option in stored order.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicTaskError::Decode`] for the first option whose value
    /// does not parse.
    pub fn options(&self) -> Result<Vec<SchedulerOption>, PeriodicTaskError> {
        self.opts
            .iter()
            .flatten()
            .map(|opt| {
                opt.decode().map_err(|source| PeriodicTaskError::Decode {
                    task_id: self.id.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Builds the scheduler configuration entry for this record.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicTaskError::Decode`] if any option is malformed.
    pub fn to_config(&self) -> Result<PeriodicTaskConfig, PeriodicTaskError> {
        Ok(PeriodicTaskConfig {
            cronspec: self.cron_expr.clone(),
            task: self.task(),
            opts: self.options()?,
        })
    }
}

mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        payload: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match payload {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
