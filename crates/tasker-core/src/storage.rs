//! Persistence contract and its backends.
//!
//! The core never talks to a database directly; it goes through the
//! [`Backend`] trait, which models a document store:
//! - `put` / `get` / `delete` whole records by key
//! - `insert` / `insert_at` conditional writes that refuse an occupied key
//!   or path, checked and applied in one step
//! - `query` with a filter set, limit and order hint
//! - `update` with dotted-path partial field sets (`lists.work.task_number`)
//! - `increment` a numeric field atomically and return the new value
//!
//! Two implementations ship with the crate:
//! - [`RedbBackend`]: one record per key in redb, every mutation its own
//!   write transaction
//! - [`SnapshotBackend`]: the whole tree in memory, loaded from one JSON file
//!   at startup and rewritten on every mutation (or never, when in-memory)

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TaskerResult;

mod record;
mod redb_store;
mod snapshot;

pub use record::{get_path, remove_path, set_path, Condition, Filter, Order, Record};
pub use redb_store::RedbBackend;
pub use snapshot::SnapshotBackend;

/// Field every stored record carries with its own key
pub const KEY_FIELD: &str = "key";

/// Logical tables of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Accounts,
    Tasks,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Accounts, Table::Tasks];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Accounts => "accounts",
            Table::Tasks => "tasks",
        }
    }
}

/// Storage collaborator contract
///
/// Implementations must be safe for concurrent use; the core holds no lock
/// of its own around these calls. Errors are passed through unchanged and
/// never retried.
pub trait Backend: Send + Sync {
    /// Insert or overwrite a record. The key is taken from the record's
    /// `key` field, or a fresh ULID is assigned and written back into it.
    fn put(&self, table: Table, record: Record) -> TaskerResult<String>;

    /// Like `put`, but fails with `TaskerError::NameUnavailable` instead of
    /// overwriting an existing record.
    fn insert(&self, table: Table, record: Record) -> TaskerResult<String>;

    /// Fetch one record; `TaskerError::NotFound` when absent.
    fn get(&self, table: Table, key: &str) -> TaskerResult<Record>;

    /// Every record matching `filter`, ordered by `order`, at most `limit`.
    fn query(
        &self,
        table: Table,
        filter: &Filter,
        limit: Option<usize>,
        order: &Order,
    ) -> TaskerResult<Vec<Record>>;

    /// Remove a record. Removing an absent key is not an error.
    fn delete(&self, table: Table, key: &str) -> TaskerResult<()>;

    /// Apply a partial update. Keys of `fields` are dotted paths; a `null`
    /// value removes the addressed field. `NotFound` when the record is absent.
    fn update(&self, table: Table, key: &str, fields: &Record) -> TaskerResult<()>;

    /// Set the dotted `path` of an existing record only when nothing is
    /// stored there. `NotFound` when the record is absent,
    /// `NameUnavailable` when the path is occupied.
    fn insert_at(&self, table: Table, key: &str, path: &str, value: Value) -> TaskerResult<()>;

    /// Atomically add `delta` to the integer at `path` (missing counts as 0)
    /// and return the new value.
    fn increment(&self, table: Table, key: &str, path: &str, delta: i64) -> TaskerResult<i64>;
}

/// Shared handle passed to every component that needs storage
pub type SharedBackend = Arc<dyn Backend>;

/// Which backend a deployment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Per-record document store (redb)
    #[default]
    Redb,
    /// Single JSON blob, rewritten on every mutation
    Snapshot,
}

impl std::str::FromStr for BackendKind {
    type Err = crate::error::TaskerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(BackendKind::Redb),
            "snapshot" => Ok(BackendKind::Snapshot),
            other => Err(crate::error::TaskerError::ValidationFailed(format!(
                "unknown backend '{}'",
                other
            ))),
        }
    }
}

/// Serialize a typed value into a storage record with the given key.
pub fn to_record<T: Serialize>(value: &T, key: &str) -> TaskerResult<Record> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(mut map) => {
            map.insert(KEY_FIELD.to_string(), serde_json::Value::String(key.to_string()));
            Ok(map)
        }
        other => Err(crate::error::TaskerError::Storage(format!(
            "expected an object record, got {}",
            other
        ))),
    }
}

/// Deserialize a storage record, ignoring its `key` field.
pub fn from_record<T: serde::de::DeserializeOwned>(mut record: Record) -> TaskerResult<T> {
    record.remove(KEY_FIELD);
    Ok(serde_json::from_value(serde_json::Value::Object(record))?)
}
