//! Offline key rotation.
//!
//! Re-encrypts every stored task from one key pair to another. Meant to run
//! against a stopped deployment; nothing here coordinates with live writers.

use serde_json::Value;
use tracing::{info, warn};

use crate::crypto::FieldCipher;
use crate::error::TaskerResult;
use crate::storage::{from_record, Backend, Filter, Order, Record, Table};
use crate::types::Task;

/// Outcome of a rotation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Tasks now readable with the new key
    pub rotated: usize,
    /// Deleted sentinels, which carry no content
    pub skipped: usize,
    /// Keys of tasks left untouched, with the reason
    pub failed: Vec<(String, String)>,
}

impl RotationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Re-encrypt the three sensitive fields of every task with `new`.
///
/// A task that does not decrypt under `old` is reported and left as it was;
/// the run continues with the next one. Storage errors abort the run.
pub fn rotate(backend: &dyn Backend, old: &FieldCipher, new: &FieldCipher) -> TaskerResult<RotationReport> {
    let records = backend.query(Table::Tasks, &Filter::new(), None, &Order::Unordered)?;
    let mut report = RotationReport::default();

    for record in records {
        let task: Task = from_record(record)?;
        if task.is_deleted() {
            report.skipped += 1;
            continue;
        }

        let key = task.key();
        match reseal(&task, old, new) {
            Ok(fields) => {
                backend.update(Table::Tasks, &key, &fields)?;
                report.rotated += 1;
            }
            Err(e) => {
                warn!(%key, error = %e, "Task left on old key");
                report.failed.push((key, e.to_string()));
            }
        }
    }

    info!(
        rotated = report.rotated,
        skipped = report.skipped,
        failed = report.failed.len(),
        "Key rotation finished"
    );
    Ok(report)
}

fn reseal(task: &Task, old: &FieldCipher, new: &FieldCipher) -> TaskerResult<Record> {
    let mut fields = Record::new();
    for (name, ciphertext) in [
        ("title", &task.title),
        ("summary", &task.summary),
        ("description", &task.description),
    ] {
        let plaintext = old.decrypt(ciphertext)?;
        fields.insert(name.into(), Value::String(new.encrypt(&plaintext)?));
    }
    Ok(fields)
}
