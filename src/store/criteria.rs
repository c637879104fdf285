//! Query criteria: field filters plus pagination.
//!
//! A [`Filter`] is a conjunction of per-field conditions evaluated against
//! stored documents. [`Criteria`] adds the offset/size window (and an
//! optional keyset cursor) used by
//! [`PeriodicTaskStorage::find`](crate::store::PeriodicTaskStorage::find).

use serde_json::Value;

use crate::store::backend::Document;

/// A single condition on one document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field is present and equal to the value. A missing field never matches.
    Eq(Value),
    /// Field is missing or differs from the value.
    Ne(Value),
    /// Field presence (`true`) or absence (`false`).
    Exists(bool),
}

/// A condition bound to a field name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Document field name (e.g. `"enabled"`).
    pub field: String,
    /// Condition the field must satisfy.
    pub condition: Condition,
}

/// A conjunction of field conditions. The empty filter matches everything.
///
/// # Examples
///
/// ```
/// use periodic_tasks::store::Filter;
/// use serde_json::json;
///
/// let filter = Filter::new().eq("enabled", json!(true));
/// let doc = json!({"id": "t1", "enabled": true});
/// assert!(filter.matches(doc.as_object().unwrap()));
///
/// let unset = json!({"id": "t2"});
/// assert!(!filter.matches(unset.as_object().unwrap()));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Conditions, all of which must hold.
    pub conditions: Vec<FieldFilter>,
}

impl Filter {
    /// Creates a filter that matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push(FieldFilter {
            field: field.into(),
            condition,
        });
        self
    }

    /// Adds an equality condition.
    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.with(field, Condition::Eq(value))
    }

    /// Adds an inequality condition.
    pub fn ne(self, field: impl Into<String>, value: Value) -> Self {
        self.with(field, Condition::Ne(value))
    }

    /// Adds a presence condition.
    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.with(field, Condition::Exists(present))
    }

    /// Matches records whose `enabled` flag is explicitly `true`.
    pub fn enabled() -> Self {
        Self::new().eq("enabled", Value::Bool(true))
    }

    /// Returns `true` if the document satisfies every condition.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|f| {
            let actual = doc.get(&f.field);
            match &f.condition {
                Condition::Eq(expected) => actual == Some(expected),
                Condition::Ne(expected) => actual != Some(expected),
                Condition::Exists(present) => actual.is_some() == *present,
            }
        })
    }
}

/// Filter plus pagination window for a find query.
///
/// Results are ordered ascending by `id`. `index` skips that many matching
/// records; `size` caps the page (`None` means unbounded). When `after_id`
/// is set only records with a strictly greater `id` are considered, before
/// `index` is applied.
///
/// # Examples
///
/// ```
/// use periodic_tasks::store::Criteria;
///
/// let criteria = Criteria::enabled().with_index(40).with_size(20);
/// assert_eq!(criteria.index, 40);
/// assert_eq!(criteria.size, Some(20));
/// assert!(criteria.after_id.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    /// Field conditions.
    pub filter: Filter,
    /// Number of matching records to skip.
    pub index: u64,
    /// Maximum records to return.
    pub size: Option<u64>,
    /// Keyset cursor: only records with `id > after_id`.
    pub after_id: Option<String>,
}

impl Criteria {
    /// Creates criteria matching everything, unpaginated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria selecting only enabled records.
    pub fn enabled() -> Self {
        Self::new().with_filter(Filter::enabled())
    }

    /// Replaces the filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the offset.
    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    /// Sets the page size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the keyset cursor.
    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after_id = Some(id.into());
        self
    }
}
