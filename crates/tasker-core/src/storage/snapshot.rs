//! Single-snapshot backend.
//!
//! The entire account/list/task tree lives in memory and is mirrored to one
//! JSON file: loaded fully at startup, rewritten fully (temp file + rename)
//! after every mutation. Without a path it never touches disk, which is what
//! the tests use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{TaskerError, TaskerResult};

use serde_json::Value;

use super::record::{
    apply_increment, apply_insert, apply_update, ensure_key, select, Filter, Order, Record,
};
use super::{Backend, Table};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    accounts: BTreeMap<String, Record>,
    #[serde(default)]
    tasks: BTreeMap<String, Record>,
}

impl Snapshot {
    fn table(&self, table: Table) -> &BTreeMap<String, Record> {
        match table {
            Table::Accounts => &self.accounts,
            Table::Tasks => &self.tasks,
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut BTreeMap<String, Record> {
        match table {
            Table::Accounts => &mut self.accounts,
            Table::Tasks => &mut self.tasks,
        }
    }
}

/// Whole-tree JSON snapshot store
pub struct SnapshotBackend {
    path: Option<PathBuf>,
    state: RwLock<Snapshot>,
}

impl SnapshotBackend {
    /// Purely in-memory store.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(Snapshot::default()),
        }
    }

    /// Load the snapshot at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> TaskerResult<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = if path.exists() {
            let bytes = std::fs::read(&path)?;
            if bytes.is_empty() {
                Snapshot::default()
            } else {
                serde_json::from_slice(&bytes)?
            }
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Snapshot::default()
        };

        tracing::debug!(
            path = %path.display(),
            accounts = snapshot.accounts.len(),
            tasks = snapshot.tasks.len(),
            "Loaded snapshot"
        );

        Ok(Self {
            path: Some(path),
            state: RwLock::new(snapshot),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, snapshot: &Snapshot) -> TaskerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = serde_json::to_vec(snapshot)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Apply `f` to a copy of the tree, persist it, then publish it. A failed
    /// write leaves the in-memory state untouched.
    fn mutate<T>(&self, f: impl FnOnce(&mut Snapshot) -> TaskerResult<T>) -> TaskerResult<T> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(out)
    }
}

impl Backend for SnapshotBackend {
    fn put(&self, table: Table, mut record: Record) -> TaskerResult<String> {
        let key = ensure_key(&mut record);
        self.mutate(|s| {
            s.table_mut(table).insert(key.clone(), record);
            Ok(())
        })?;
        Ok(key)
    }

    fn insert(&self, table: Table, mut record: Record) -> TaskerResult<String> {
        let key = ensure_key(&mut record);
        self.mutate(|s| {
            let rows = s.table_mut(table);
            if rows.contains_key(&key) {
                return Err(TaskerError::NameUnavailable(format!(
                    "{}/{} already exists",
                    table.name(),
                    key
                )));
            }
            rows.insert(key.clone(), record);
            Ok(())
        })?;
        Ok(key)
    }

    fn get(&self, table: Table, key: &str) -> TaskerResult<Record> {
        self.state
            .read()
            .table(table)
            .get(key)
            .cloned()
            .ok_or_else(|| TaskerError::NotFound(format!("{}/{}", table.name(), key)))
    }

    fn query(
        &self,
        table: Table,
        filter: &Filter,
        limit: Option<usize>,
        order: &Order,
    ) -> TaskerResult<Vec<Record>> {
        let state = self.state.read();
        let rows = state
            .table(table)
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect::<Vec<_>>();
        Ok(select(rows, &Filter::default(), limit, order))
    }

    fn delete(&self, table: Table, key: &str) -> TaskerResult<()> {
        self.mutate(|s| {
            s.table_mut(table).remove(key);
            Ok(())
        })
    }

    fn update(&self, table: Table, key: &str, fields: &Record) -> TaskerResult<()> {
        self.mutate(|s| {
            let record = s
                .table_mut(table)
                .get_mut(key)
                .ok_or_else(|| TaskerError::NotFound(format!("{}/{}", table.name(), key)))?;
            apply_update(record, fields)
        })
    }

    fn insert_at(&self, table: Table, key: &str, path: &str, value: Value) -> TaskerResult<()> {
        self.mutate(|s| {
            let record = s
                .table_mut(table)
                .get_mut(key)
                .ok_or_else(|| TaskerError::NotFound(format!("{}/{}", table.name(), key)))?;
            apply_insert(record, path, value)
        })
    }

    fn increment(&self, table: Table, key: &str, path: &str, delta: i64) -> TaskerResult<i64> {
        self.mutate(|s| {
            let record = s
                .table_mut(table)
                .get_mut(key)
                .ok_or_else(|| TaskerError::NotFound(format!("{}/{}", table.name(), key)))?;
            apply_increment(record, path, delta)
        })
    }
}
