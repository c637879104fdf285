//! Extensible task options and their typed scheduler counterparts.
//!
//! Options are stored as `{"type": "...", "value": "..."}` pairs so new
//! option kinds never require a schema change. [`TaskOption::decode`] maps a
//! stored pair to a [`SchedulerOption`]:
//!
//! | type | decoded as | value grammar |
//! |------|------------|---------------|
//! | `queue` | [`SchedulerOption::Queue`] | verbatim |
//! | `timeout` | [`SchedulerOption::Timeout`] | duration |
//! | `deadline` | [`SchedulerOption::Deadline`] | timestamp |
//! | `unique` | [`SchedulerOption::Unique`] | duration |
//! | `process-at` | [`SchedulerOption::ProcessAt`] | timestamp |
//! | `process-in` | [`SchedulerOption::ProcessIn`] | duration |
//! | `task-id` | [`SchedulerOption::TaskId`] | verbatim |
//! | `retention` | [`SchedulerOption::Retention`] | duration |
//! | `group` | [`SchedulerOption::Group`] | verbatim |
//! | `max-retry` or anything else | [`SchedulerOption::MaxRetry`] | integer |
//!
//! See [`parse`](crate::types::parse) for the duration and timestamp
//! grammars.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::OptionDecodeError;
use crate::types::parse::{format_duration, parse_duration, parse_retry_count, parse_timestamp};

/// The kind of a stored option.
///
/// Unknown type strings are kept verbatim in [`OptionType::Other`] so a
/// record written by a newer producer survives a round trip through this
/// crate unchanged.
///
/// # Examples
///
/// ```
/// use periodic_tasks::OptionType;
///
/// assert_eq!(OptionType::from("process-in"), OptionType::ProcessIn);
/// assert_eq!(OptionType::from("uniqueness-window"), OptionType::Unique);
/// assert_eq!(OptionType::from("priority").to_string(), "priority");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionType {
    /// Named dispatch queue.
    Queue,
    /// Per-task execution timeout.
    Timeout,
    /// Absolute execution deadline.
    Deadline,
    /// Deduplication window.
    Unique,
    /// Earliest absolute execution instant.
    ProcessAt,
    /// Earliest execution delay, relative to enqueue time.
    ProcessIn,
    /// Explicit scheduler task identifier.
    TaskId,
    /// How long results are retained.
    Retention,
    /// Aggregation group name.
    Group,
    /// Retry ceiling.
    MaxRetry,
    /// Any type string this crate does not recognise.
    Other(String),
}

impl OptionType {
    /// Returns the stored type string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queue => "queue",
            Self::Timeout => "timeout",
            Self::Deadline => "deadline",
            Self::Unique => "unique",
            Self::ProcessAt => "process-at",
            Self::ProcessIn => "process-in",
            Self::TaskId => "task-id",
            Self::Retention => "retention",
            Self::Group => "group",
            Self::MaxRetry => "max-retry",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "queue" => Self::Queue,
            "timeout" => Self::Timeout,
            "deadline" => Self::Deadline,
            "unique" | "uniqueness-window" => Self::Unique,
            "process-at" => Self::ProcessAt,
            "process-in" => Self::ProcessIn,
            "task-id" => Self::TaskId,
            "retention" => Self::Retention,
            "group" => Self::Group,
            "max-retry" => Self::MaxRetry,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for OptionType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl Serialize for OptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OptionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// A stored `(type, value)` option attached to a periodic task.
///
/// Several options of the same type may coexist on one task; they are kept
/// in order and each one is decoded.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use periodic_tasks::{SchedulerOption, TaskOption};
///
/// let opt = TaskOption::timeout(Duration::from_secs(30));
/// assert_eq!(opt.value, "30s");
/// assert_eq!(opt.decode(), Ok(SchedulerOption::Timeout(Duration::from_secs(30))));
///
/// let json = serde_json::to_string(&TaskOption::queue("critical")).unwrap();
/// assert_eq!(json, r#"{"type":"queue","value":"critical"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOption {
    /// What the value means.
    #[serde(rename = "type")]
    pub kind: OptionType,

    /// Raw value, interpreted according to `kind`.
    pub value: String,
}

impl TaskOption {
    /// Creates an option from a kind and raw value.
    pub fn new(kind: impl Into<OptionType>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// A `queue` option.
    pub fn queue(name: impl Into<String>) -> Self {
        Self::new(OptionType::Queue, name)
    }

    /// A `timeout` option.
    pub fn timeout(timeout: Duration) -> Self {
        Self::new(OptionType::Timeout, format_duration(timeout))
    }

    /// A `deadline` option.
    pub fn deadline(at: DateTime<Utc>) -> Self {
        Self::new(
            OptionType::Deadline,
            at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
    }

    /// A `unique` option.
    pub fn unique(window: Duration) -> Self {
        Self::new(OptionType::Unique, format_duration(window))
    }

    /// A `process-at` option.
    pub fn process_at(at: DateTime<Utc>) -> Self {
        Self::new(
            OptionType::ProcessAt,
            at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
    }

    /// A `process-in` option.
    pub fn process_in(delay: Duration) -> Self {
        Self::new(OptionType::ProcessIn, format_duration(delay))
    }

    /// A `task-id` option.
    pub fn task_id(id: impl Into<String>) -> Self {
        Self::new(OptionType::TaskId, id)
    }

    /// A `retention` option.
    pub fn retention(period: Duration) -> Self {
        Self::new(OptionType::Retention, format_duration(period))
    }

    /// A `group` option.
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(OptionType::Group, name)
    }

    /// A `max-retry` option.
    pub fn max_retry(retries: u32) -> Self {
        Self::new(OptionType::MaxRetry, retries.to_string())
    }

    /// Decodes the raw value into a typed scheduler option.
    ///
    /// # Errors
    ///
    /// Returns [`OptionDecodeError`] when the value does not match the
    /// grammar of its type. No value is ever replaced by a default.
    pub fn decode(&self) -> Result<SchedulerOption, OptionDecodeError> {
        let reject = |reason: String| OptionDecodeError {
            kind: self.kind.clone(),
            value: self.value.clone(),
            reason,
        };

        let decoded = match &self.kind {
            OptionType::Queue => SchedulerOption::Queue(self.value.clone()),
            OptionType::Timeout => {
                SchedulerOption::Timeout(parse_duration(&self.value).map_err(reject)?)
            },
            OptionType::Deadline => {
                SchedulerOption::Deadline(parse_timestamp(&self.value).map_err(reject)?)
            },
            OptionType::Unique => {
                SchedulerOption::Unique(parse_duration(&self.value).map_err(reject)?)
            },
            OptionType::ProcessAt => {
                SchedulerOption::ProcessAt(parse_timestamp(&self.value).map_err(reject)?)
            },
            OptionType::ProcessIn => {
                SchedulerOption::ProcessIn(parse_duration(&self.value).map_err(reject)?)
            },
            OptionType::TaskId => SchedulerOption::TaskId(self.value.clone()),
            OptionType::Retention => {
                SchedulerOption::Retention(parse_duration(&self.value).map_err(reject)?)
            },
            OptionType::Group => SchedulerOption::Group(self.value.clone()),
            OptionType::MaxRetry | OptionType::Other(_) => {
                SchedulerOption::MaxRetry(parse_retry_count(&self.value).map_err(reject)?)
            },
        };
        Ok(decoded)
    }
}

/// A decoded, strongly typed enqueue option for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerOption {
    /// Dispatch queue name.
    Queue(String),
    /// Execution timeout.
    Timeout(Duration),
    /// Absolute execution deadline.
    Deadline(DateTime<Utc>),
    /// Deduplication window.
    Unique(Duration),
    /// Earliest execution instant.
    ProcessAt(DateTime<Utc>),
    /// Delay before the task becomes eligible.
    ProcessIn(Duration),
    /// Explicit task identifier.
    TaskId(String),
    /// Result retention period.
    Retention(Duration),
    /// Aggregation group.
    Group(String),
    /// Retry ceiling.
    MaxRetry(u32),
}

impl SchedulerOption {
    /// The option type this value decodes from.
    pub fn kind(&self) -> OptionType {
        match self {
            Self::Queue(_) => OptionType::Queue,
            Self::Timeout(_) => OptionType::Timeout,
            Self::Deadline(_) => OptionType::Deadline,
            Self::Unique(_) => OptionType::Unique,
            Self::ProcessAt(_) => OptionType::ProcessAt,
            Self::ProcessIn(_) => OptionType::ProcessIn,
            Self::TaskId(_) => OptionType::TaskId,
            Self::Retention(_) => OptionType::Retention,
            Self::Group(_) => OptionType::Group,
            Self::MaxRetry(_) => OptionType::MaxRetry,
        }
    }
}
