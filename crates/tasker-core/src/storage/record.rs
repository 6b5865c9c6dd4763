//! Record helpers shared by every backend: dotted paths, filters, ordering.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{TaskerError, TaskerResult};

/// A stored record: a JSON object of field/value pairs
pub type Record = Map<String, Value>;

/// Look up a dotted path (`lists.work.task_number`).
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set a dotted path, creating intermediate objects as needed.
pub fn set_path(record: &mut Record, path: &str, value: Value) -> TaskerResult<()> {
    let parts: Vec<&str> = path.split('.').collect();
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| TaskerError::Storage("empty field path".into()))?;

    let mut current = record;
    for part in parents {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = entry.as_object_mut().ok_or_else(|| {
            TaskerError::Storage(format!("'{}' in path '{}' is not an object", part, path))
        })?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Remove a dotted path; returns the removed value if there was one.
pub fn remove_path(record: &mut Record, path: &str) -> Option<Value> {
    let parts: Vec<&str> = path.split('.').collect();
    let (last, parents) = parts.split_last()?;

    let mut current = record;
    for part in parents {
        current = current.get_mut(*part)?.as_object_mut()?;
    }
    current.remove(*last)
}

/// Apply a partial update where `null` removes the addressed field.
pub(crate) fn apply_update(record: &mut Record, fields: &Record) -> TaskerResult<()> {
    for (path, value) in fields {
        if value.is_null() {
            remove_path(record, path);
        } else {
            set_path(record, path, value.clone())?;
        }
    }
    Ok(())
}

/// Set `path` only when nothing is stored there yet.
pub(crate) fn apply_insert(record: &mut Record, path: &str, value: Value) -> TaskerResult<()> {
    if get_path(record, path).is_some_and(|v| !v.is_null()) {
        return Err(TaskerError::NameUnavailable(format!("'{}' is taken", path)));
    }
    set_path(record, path, value)
}

/// Take the record's key, or assign a fresh ULID and write it back.
pub(crate) fn ensure_key(record: &mut Record) -> String {
    match record.get(super::KEY_FIELD).and_then(Value::as_str) {
        Some(k) => k.to_string(),
        None => {
            let k = ulid::Ulid::new().to_string();
            record.insert(super::KEY_FIELD.to_string(), Value::String(k.clone()));
            k
        }
    }
}

/// Add `delta` to the integer at `path` and return the new value.
///
/// A missing leaf counts as 0, but its parent object must already exist so
/// a counter can never resurrect a removed entry.
pub(crate) fn apply_increment(record: &mut Record, path: &str, delta: i64) -> TaskerResult<i64> {
    if let Some((parent, _)) = path.rsplit_once('.') {
        if !get_path(record, parent).is_some_and(Value::is_object) {
            return Err(TaskerError::NotFound(format!("field '{}'", parent)));
        }
    }
    let current = match get_path(record, path) {
        None | Some(Value::Null) => 0,
        Some(v) => v
            .as_i64()
            .ok_or_else(|| TaskerError::Storage(format!("field '{}' is not an integer", path)))?,
    };
    let next = current + delta;
    set_path(record, path, Value::from(next))?;
    Ok(next)
}

/// One predicate on a (possibly dotted) field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    /// Numeric `field >= n`
    Gte(String, i64),
    /// Numeric `field < n`
    Lt(String, i64),
}

impl Condition {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Condition::Eq(field, want) => get_path(record, field) == Some(want),
            Condition::Ne(field, want) => get_path(record, field) != Some(want),
            Condition::Gte(field, n) => get_path(record, field)
                .and_then(Value::as_i64)
                .is_some_and(|v| v >= *n),
            Condition::Lt(field, n) => get_path(record, field)
                .and_then(Value::as_i64)
                .is_some_and(|v| v < *n),
        }
    }
}

/// Conjunction of conditions; the empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(field.to_string(), value.into()));
        self
    }

    pub fn ne(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Ne(field.to_string(), value.into()));
        self
    }

    pub fn gte(mut self, field: &str, n: i64) -> Self {
        self.conditions.push(Condition::Gte(field.to_string(), n));
        self
    }

    pub fn lt(mut self, field: &str, n: i64) -> Self {
        self.conditions.push(Condition::Lt(field.to_string(), n));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Ordering hint for query results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Order {
    /// Backend key order
    #[default]
    Unordered,
    Ascending(String),
    Descending(String),
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Filter, order and limit a record stream. Sorting is stable.
pub(crate) fn select(
    records: impl IntoIterator<Item = Record>,
    filter: &Filter,
    limit: Option<usize>,
    order: &Order,
) -> Vec<Record> {
    let mut out: Vec<Record> = records.into_iter().filter(|r| filter.matches(r)).collect();
    match order {
        Order::Unordered => {}
        Order::Ascending(field) => {
            out.sort_by(|a, b| compare_values(a.get(field), b.get(field)));
        }
        Order::Descending(field) => {
            out.sort_by(|a, b| compare_values(b.get(field), a.get(field)));
        }
    }
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}
