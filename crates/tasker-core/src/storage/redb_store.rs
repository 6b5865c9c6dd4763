//! Per-record document backend on redb.
//!
//! Each logical table is a redb table of `key -> JSON bytes`. Every mutation,
//! including `increment`, is a single write transaction; redb serializes
//! writers, which is what makes the counter increment atomic.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{TaskerError, TaskerResult};

use serde_json::Value;

use super::record::{
    apply_increment, apply_insert, apply_update, ensure_key, select, Filter, Order, Record,
};
use super::{Backend, Table};

const ACCOUNTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
const TASKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

fn definition(table: Table) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match table {
        Table::Accounts => ACCOUNTS_TABLE,
        Table::Tasks => TASKS_TABLE,
    }
}

fn decode(bytes: &[u8]) -> TaskerResult<Record> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Storage backend using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create the database at `path`.
    ///
    /// This will:
    /// - Create the parent directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn open(path: impl AsRef<Path>) -> TaskerResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS_TABLE)?;
            let _ = write_txn.open_table(TASKS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Read-modify-write one record inside a single write transaction.
    fn modify<T>(
        &self,
        table: Table,
        key: &str,
        f: impl FnOnce(&mut Record) -> TaskerResult<T>,
    ) -> TaskerResult<T> {
        let write_txn = self.db.begin_write()?;
        let out = {
            let mut t = write_txn.open_table(definition(table))?;
            let current = t.get(key)?.map(|v| v.value().to_vec());
            let mut record = match current {
                Some(bytes) => decode(&bytes)?,
                None => {
                    return Err(TaskerError::NotFound(format!("{}/{}", table.name(), key)));
                }
            };
            let out = f(&mut record)?;
            let data = serde_json::to_vec(&record)?;
            t.insert(key, data.as_slice())?;
            out
        };
        write_txn.commit()?;
        Ok(out)
    }
}

impl Backend for RedbBackend {
    fn put(&self, table: Table, mut record: Record) -> TaskerResult<String> {
        let key = ensure_key(&mut record);

        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(definition(table))?;
            let data = serde_json::to_vec(&record)?;
            t.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(key)
    }

    fn insert(&self, table: Table, mut record: Record) -> TaskerResult<String> {
        let key = ensure_key(&mut record);

        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(definition(table))?;
            if t.get(key.as_str())?.is_some() {
                return Err(TaskerError::NameUnavailable(format!(
                    "{}/{} already exists",
                    table.name(),
                    key
                )));
            }
            let data = serde_json::to_vec(&record)?;
            t.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(key)
    }

    fn get(&self, table: Table, key: &str) -> TaskerResult<Record> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(definition(table))?;

        match t.get(key)? {
            Some(v) => decode(v.value()),
            None => Err(TaskerError::NotFound(format!("{}/{}", table.name(), key))),
        }
    }

    fn query(
        &self,
        table: Table,
        filter: &Filter,
        limit: Option<usize>,
        order: &Order,
    ) -> TaskerResult<Vec<Record>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(definition(table))?;

        let mut records = Vec::new();
        for entry in t.iter()? {
            let (_, value) = entry?;
            records.push(decode(value.value())?);
        }
        Ok(select(records, filter, limit, order))
    }

    fn delete(&self, table: Table, key: &str) -> TaskerResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(definition(table))?;
            t.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn update(&self, table: Table, key: &str, fields: &Record) -> TaskerResult<()> {
        self.modify(table, key, |record| apply_update(record, fields))
    }

    fn insert_at(&self, table: Table, key: &str, path: &str, value: Value) -> TaskerResult<()> {
        self.modify(table, key, |record| apply_insert(record, path, value))
    }

    fn increment(&self, table: Table, key: &str, path: &str, delta: i64) -> TaskerResult<i64> {
        self.modify(table, key, |record| apply_increment(record, path, delta))
    }
}
