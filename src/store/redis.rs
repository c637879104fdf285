//! Redis document backend.
//!
//! [`RedisBackend`] implements [`DocumentBackend`] with one Redis hash per
//! document. Every top-level document field is a hash field holding the
//! field's JSON encoding, so a `$set` merge is a plain `HSET` of the named
//! fields and untouched fields stay as they are.
//!
//! # Key Schema
//!
//! | Key Pattern | Type | Purpose |
//! |-------------|------|---------|
//! | `{prefix}:docs:{id}` | Hash | One document, field -> JSON value |
//! | `{prefix}:ids` | Sorted Set | All ids, score 0, lexicographic order |
//! | `{prefix}:indexes` | Hash | Index name -> key definition |
//!
//! Writes that touch more than one key (upsert, delete, index creation) run
//! as Lua scripts so the insert-or-merge decision is atomic.
//!
//! The prefix defaults to the default collection name; a service built with
//! `SchedulerStoreService::with_backend` uses the configured collection.
//!
//! # Query Cost
//!
//! Filters are evaluated client-side while walking `{prefix}:ids` in order,
//! which keeps results ordered by id without a secondary index. The price:
//!
//! - `find` issues one `ZRANGEBYLEX` over the ids (from the keyset cursor
//!   when one is given) and then one `HGETALL` per document until the
//!   window is filled. An offset page therefore costs `offset + size`
//!   round trips at least, plus one per non-matching document walked.
//! - `count` loads every document in the collection.
//!
//! Keyset pagination keeps the per-page cost at `size` plus non-matching
//! documents, independent of how deep the snapshot has progressed.
//!
//! # Usage
//!
//! ```rust,no_run
//! use periodic_tasks::store::redis::RedisBackend;
//! use periodic_tasks::store::generic::GenericTaskStorage;
//!
//! # async fn example() {
//! let backend = RedisBackend::new("redis://127.0.0.1:6379").await.unwrap();
//! let storage = GenericTaskStorage::new(backend);
//! # }
//! ```

use std::collections::HashMap;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Script};
use async_trait::async_trait;
use serde_json::Value;

use crate::constants::DEFAULT_COLLECTION;
use crate::store::backend::{
    Document, DocumentBackend, FindOptions, IndexDirection, IndexModel, StorageError,
    UpsertOutcome, ID_FIELD,
};
use crate::store::criteria::Filter;

// ---------------------------------------------------------------------------
// Lua script constants
// ---------------------------------------------------------------------------

/// Upsert: merge `$set` fields, add insert-only fields when the hash is new.
///
/// KEYS[1] = document hash key, KEYS[2] = id sorted set key.
/// ARGV[1] = id (sorted set member), ARGV[2] = JSON-encoded id,
/// ARGV[3] = number of `$set` arguments (field/value pairs, flattened),
/// then the `$set` arguments, then the `$setOnInsert` arguments.
/// Returns: 1 if inserted, 0 if an existing document was merged.
const LUA_UPSERT: &str = r#"
local existed = redis.call('EXISTS', KEYS[1]) == 1
local set_len = tonumber(ARGV[3])
local first_insert = 4 + set_len

if set_len > 0 then
    redis.call('HSET', KEYS[1], unpack(ARGV, 4, 3 + set_len))
end

if existed then
    return 0
end

redis.call('HSET', KEYS[1], 'id', ARGV[2])
if #ARGV >= first_insert then
    redis.call('HSET', KEYS[1], unpack(ARGV, first_insert, #ARGV))
end
redis.call('ZADD', KEYS[2], 0, ARGV[1])
return 1
"#;

/// Delete: remove the document hash and its id entry.
///
/// KEYS[1] = document hash key, KEYS[2] = id sorted set key.
/// ARGV[1] = id.
/// Returns: 1 if the document existed, 0 otherwise.
const LUA_DELETE: &str = r#"
local existed = redis.call('DEL', KEYS[1])
redis.call('ZREM', KEYS[2], ARGV[1])
return existed
"#;

/// Create index: record the definition unless the name is already taken.
///
/// KEYS[1] = index hash key. ARGV[1] = name, ARGV[2] = definition.
/// Returns: 1 created, 0 identical definition exists, -1 conflict.
const LUA_CREATE_INDEX: &str = r#"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 1 then
    return 1
end
if redis.call('HGET', KEYS[1], ARGV[1]) == ARGV[2] then
    return 0
end
return -1
"#;

// ---------------------------------------------------------------------------
// RedisBackend struct
// ---------------------------------------------------------------------------

/// Redis document backend for periodic task records.
///
/// # Connection Model
///
/// Holds a [`MultiplexedConnection`]; clones share one TCP connection and
/// each call works on its own clone.
#[derive(Debug, Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisBackend {
    /// Connects to Redis at `url` with the default collection as key prefix.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the client cannot be created or
    /// the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(url).map_err(|e| StorageError::Backend {
            message: format!("failed to create Redis client: {e}"),
            source: Some(Box::new(e)),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Backend {
                message: format!("failed to connect to Redis: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self::with_connection(conn))
    }

    /// Wraps an existing multiplexed connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: DEFAULT_COLLECTION.to_string(),
        }
    }

    /// Sets the key prefix, usually the collection name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn doc_key(&self, id: &str) -> String {
        format!("{}:docs:{}", self.key_prefix, id)
    }

    fn ids_key(&self) -> String {
        format!("{}:ids", self.key_prefix)
    }

    fn indexes_key(&self) -> String {
        format!("{}:indexes", self.key_prefix)
    }

    async fn load(&self, id: &str) -> Result<Option<Document>, StorageError> {
        let fields: HashMap<String, String> = self
            .conn
            .clone()
            .hgetall(self.doc_key(id))
            .await
            .map_err(|e| map_redis_error(e, id))?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_fields(id, fields).map(Some)
    }

    /// Walks ids in order, yielding matching documents to `visit` until it
    /// returns `false`.
    async fn scan<F>(
        &self,
        filter: &Filter,
        after_id: Option<&str>,
        mut visit: F,
    ) -> Result<(), StorageError>
    where
        F: FnMut(Document) -> bool + Send,
    {
        let min = after_id.map_or_else(|| "-".to_string(), |after| format!("({after}"));
        let ids: Vec<String> = self
            .conn
            .clone()
            .zrangebylex(self.ids_key(), min, "+")
            .await
            .map_err(|e| map_redis_error(e, &self.ids_key()))?;

        for id in ids {
            // A concurrent delete may have removed the hash since ZRANGEBYLEX.
            let Some(doc) = self.load(&id).await? else {
                continue;
            };
            if filter.matches(&doc) && !visit(doc) {
                break;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Maps a Redis error to a [`StorageError::Backend`].
fn map_redis_error(err: ::redis::RedisError, key: &str) -> StorageError {
    StorageError::Backend {
        message: format!("Redis error for key {key}: {err}"),
        source: Some(Box::new(err)),
    }
}

fn encode_value(value: &Value) -> String {
    value.to_string()
}

/// Flattens a document into `field, json, field, json, ...` script args.
fn flatten(doc: &Document) -> Vec<String> {
    doc.iter()
        .filter(|(field, _)| field.as_str() != ID_FIELD)
        .flat_map(|(field, value)| [field.clone(), encode_value(value)])
        .collect()
}

fn decode_fields(id: &str, fields: HashMap<String, String>) -> Result<Document, StorageError> {
    let mut names: Vec<_> = fields.keys().cloned().collect();
    names.sort();
    let mut doc = Document::new();
    for name in names {
        let raw = &fields[&name];
        let value: Value = serde_json::from_str(raw).map_err(|e| StorageError::Backend {
            message: format!("malformed field {name} in document {id}: {e}"),
            source: Some(Box::new(e)),
        })?;
        doc.insert(name, value);
    }
    Ok(doc)
}

fn index_definition(index: &IndexModel) -> String {
    index
        .keys
        .iter()
        .map(|(field, direction)| match direction {
            IndexDirection::Ascending => format!("{field}:1"),
            IndexDirection::Descending => format!("{field}:-1"),
        })
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// DocumentBackend implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl DocumentBackend for RedisBackend {
    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError> {
        let mut skip = options.skip;
        let limit = options.limit.unwrap_or(u64::MAX);
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }

        self.scan(filter, options.after_id.as_deref(), |doc| {
            if skip > 0 {
                skip -= 1;
                return true;
            }
            out.push(doc);
            (out.len() as u64) < limit
        })
        .await?;
        Ok(out)
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        let mut n = 0u64;
        self.scan(filter, None, |_| {
            n += 1;
            true
        })
        .await?;
        Ok(n)
    }

    async fn find_one(&self, id: &str) -> Result<Option<Document>, StorageError> {
        self.load(id).await
    }

    async fn upsert(
        &self,
        id: &str,
        set: Document,
        set_on_insert: Document,
    ) -> Result<UpsertOutcome, StorageError> {
        let set_args = flatten(&set);
        let insert_args = flatten(&set_on_insert);

        let script = Script::new(LUA_UPSERT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(self.doc_key(id))
            .key(self.ids_key())
            .arg(id)
            .arg(encode_value(&Value::String(id.to_string())))
            .arg(set_args.len());
        for arg in set_args.iter().chain(insert_args.iter()) {
            invocation.arg(arg);
        }

        let inserted: i64 = invocation
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, id))?;

        Ok(UpsertOutcome {
            matched: inserted == 0,
            upserted: inserted == 1,
        })
    }

    async fn delete_one(&self, id: &str) -> Result<bool, StorageError> {
        let script = Script::new(LUA_DELETE);
        let existed: i64 = script
            .key(self.doc_key(id))
            .key(self.ids_key())
            .arg(id)
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, id))?;
        Ok(existed == 1)
    }

    async fn create_index(&self, index: &IndexModel) -> Result<String, StorageError> {
        let script = Script::new(LUA_CREATE_INDEX);
        let status: i64 = script
            .key(self.indexes_key())
            .arg(&index.name)
            .arg(index_definition(index))
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, &index.name))?;

        if status < 0 {
            return Err(StorageError::IndexConflict {
                name: index.name.clone(),
            });
        }
        Ok(index.name.clone())
    }

    fn for_collection(self, collection: &str) -> Self {
        self.with_prefix(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_skips_id_and_encodes_json() {
        let doc = json!({"id": "t1", "enabled": true, "job_code": "a"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            flatten(&doc),
            vec!["enabled", "true", "job_code", "\"a\""]
        );
    }

    #[test]
    fn decode_fields_parses_json_values() {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), "\"t1\"".to_string());
        fields.insert("opts".to_string(), "[]".to_string());
        let doc = decode_fields("t1", fields).unwrap();
        assert_eq!(Value::Object(doc), json!({"id": "t1", "opts": []}));
    }

    #[test]
    fn decode_fields_rejects_garbage() {
        let mut fields = HashMap::new();
        fields.insert("enabled".to_string(), "yes please".to_string());
        assert!(matches!(
            decode_fields("t1", fields),
            Err(StorageError::Backend { .. })
        ));
    }

    #[test]
    fn index_definition_is_stable() {
        let index = IndexModel::ascending("lookup", ["job_code", "enabled"]);
        assert_eq!(index_definition(&index), "job_code:1,enabled:1");
    }
}

// ---------------------------------------------------------------------------
// Integration tests -- Redis backend contract tests
// ---------------------------------------------------------------------------
