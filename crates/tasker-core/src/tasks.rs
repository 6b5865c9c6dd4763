//! Task store: permission-checked, encrypted task records.
//!
//! Every operation resolves the target list first and checks the requester
//! against its mask before any ciphertext is read or written. The three
//! sensitive fields go through the [`FieldCipher`] concurrently, and the
//! first failure aborts the whole record operation.
//!
//! Records are keyed by the list's generation. A write whose list was deleted
//! while it was in flight is rolled back instead of surfacing in a new list
//! of the same name.

use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Principal;
use crate::crypto::FieldCipher;
use crate::error::{TaskerError, TaskerResult};
use crate::pagination::{sort_by_recency, PageWindow};
use crate::permissions::{can_read, can_write};
use crate::registry::ListRegistry;
use crate::storage::{from_record, to_record, Filter, Order, Record, SharedBackend, Table, KEY_FIELD};
use crate::types::{Task, TaskDraft, TaskId, TaskList, TaskStatus};

/// Encrypted title, summary and description
struct Sealed {
    title: String,
    summary: String,
    description: String,
}

/// Task operations over a shared backend and the process key
#[derive(Clone)]
pub struct TaskStore {
    backend: SharedBackend,
    cipher: FieldCipher,
    registry: ListRegistry,
}

impl TaskStore {
    pub fn new(backend: SharedBackend, cipher: FieldCipher) -> Self {
        Self {
            registry: ListRegistry::new(backend.clone()),
            backend,
            cipher,
        }
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    /// Create a task in `owner/list` and return it in plaintext.
    ///
    /// Content is encrypted before an id is reserved, so a draft that is too
    /// large for the key never consumes an ordinal.
    pub async fn create(
        &self,
        principal: &Principal,
        owner: &str,
        list: &str,
        draft: TaskDraft,
    ) -> TaskerResult<Task> {
        let task_list = self.registry.get_list(owner, list)?;
        self.check_write(principal, &task_list)?;
        draft.validate()?;

        let sealed = self.seal(&draft).await?;
        let id = self.registry.reserve_task_id(owner, list)?;

        let mut task = Task {
            id,
            list: list.to_string(),
            owner: owner.to_string(),
            title: sealed.title,
            summary: sealed.summary,
            description: sealed.description,
            status: draft.status,
            creator: principal.handle.clone(),
            created_at: draft
                .created_at
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            due: draft.due,
            generation: task_list.generation.clone(),
        };
        let key = task.key();
        self.backend
            .insert(Table::Tasks, to_record(&task, &key)?)
            .map_err(|e| match e {
                TaskerError::NameUnavailable(_) => {
                    TaskerError::Storage(format!("task key '{}' is already in use", key))
                }
                other => other,
            })?;
        self.confirm_list(&task_list, &key)?;

        debug!(owner, list, task_id = id, creator = %principal.handle, "Task created");

        task.title = draft.title;
        task.summary = draft.summary;
        task.description = draft.description;
        Ok(task)
    }

    /// Fetch and fully decrypt one task.
    ///
    /// A deleted task is reported as `NotFound`.
    pub async fn fetch_one(
        &self,
        principal: &Principal,
        owner: &str,
        list: &str,
        id: TaskId,
    ) -> TaskerResult<Task> {
        let task_list = self.registry.get_list(owner, list)?;
        self.check_read(principal, &task_list)?;

        let mut task = self.load(&task_list, id)?;
        if task.is_deleted() {
            return Err(TaskerError::NotFound(format!("task {}", task.key())));
        }

        let fields = vec![
            std::mem::take(&mut task.title),
            std::mem::take(&mut task.summary),
            std::mem::take(&mut task.description),
        ];
        let [title, summary, description]: [String; 3] = self
            .cipher
            .decrypt_all(fields)
            .await
            .inspect_err(|e| warn!(owner, list, task_id = id, error = %e, "Task decryption failed"))?
            .try_into()
            .map_err(|_| TaskerError::Cipher("field count mismatch".into()))?;

        task.title = title;
        task.summary = summary;
        task.description = description;
        Ok(task)
    }

    /// One page of a list, newest first.
    ///
    /// The page is selected by id window (see [`PageWindow`]) and then ordered
    /// by creation time. Only title and summary are decrypted; descriptions
    /// come back empty.
    pub async fn fetch_page(
        &self,
        principal: &Principal,
        owner: &str,
        list: &str,
        page: usize,
        page_size: usize,
    ) -> TaskerResult<Vec<Task>> {
        if page_size == 0 {
            return Err(TaskerError::ValidationFailed("page size must be positive".into()));
        }
        let task_list = self.registry.get_list(owner, list)?;
        self.check_read(principal, &task_list)?;

        let window = PageWindow::new(task_list.task_number, page, page_size);
        if window.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new()
            .eq("owner", owner)
            .eq("list", list)
            .gte("id", window.start as i64)
            .lt("id", window.end as i64)
            .eq("generation", task_list.generation.as_str())
            .ne("status", TaskStatus::Deleted.as_str());
        let records = self.backend.query(
            Table::Tasks,
            &filter,
            Some(page_size),
            &Order::Descending("id".into()),
        )?;

        let tasks = records
            .into_iter()
            .map(from_record::<Task>)
            .collect::<TaskerResult<Vec<_>>>()?;

        let mut tasks = futures::future::try_join_all(tasks.into_iter().map(|mut task| async move {
            let fields = vec![std::mem::take(&mut task.title), std::mem::take(&mut task.summary)];
            let [title, summary]: [String; 2] = self
                .cipher
                .decrypt_all(fields)
                .await?
                .try_into()
                .map_err(|_| TaskerError::Cipher("field count mismatch".into()))?;
            task.title = title;
            task.summary = summary;
            task.description.clear();
            Ok::<_, TaskerError>(task)
        }))
        .await
        .inspect_err(|e| warn!(owner, list, page, error = %e, "Page decryption failed"))?;

        sort_by_recency(&mut tasks);
        Ok(tasks)
    }

    /// Overwrite a task with new content. Last write wins.
    ///
    /// Identity and creator are kept; `created_at` only changes when the
    /// draft carries an override.
    pub async fn update(
        &self,
        principal: &Principal,
        owner: &str,
        list: &str,
        id: TaskId,
        draft: TaskDraft,
    ) -> TaskerResult<Task> {
        let task_list = self.registry.get_list(owner, list)?;
        self.check_write(principal, &task_list)?;
        draft.validate()?;

        let existing = self.load(&task_list, id)?;
        if existing.is_deleted() {
            return Err(TaskerError::NotFound(format!("task {}", existing.key())));
        }

        let sealed = self.seal(&draft).await?;
        let mut task = Task {
            title: sealed.title,
            summary: sealed.summary,
            description: sealed.description,
            status: draft.status,
            created_at: draft.created_at.unwrap_or(existing.created_at),
            due: draft.due,
            ..existing
        };
        let key = task.key();
        self.backend.put(Table::Tasks, to_record(&task, &key)?)?;
        self.confirm_list(&task_list, &key)?;

        debug!(owner, list, task_id = id, status = %task.status, "Task updated");

        task.title = draft.title;
        task.summary = draft.summary;
        task.description = draft.description;
        Ok(task)
    }

    /// Mark a task deleted and wipe its content.
    ///
    /// The record stays behind as a sentinel until [`TaskStore::compact`]
    /// removes it. Deleting an already deleted task succeeds.
    pub async fn delete(
        &self,
        principal: &Principal,
        owner: &str,
        list: &str,
        id: TaskId,
    ) -> TaskerResult<()> {
        let task_list = self.registry.get_list(owner, list)?;
        self.check_write(principal, &task_list)?;

        let task = self.load(&task_list, id)?;
        if task.is_deleted() {
            return Ok(());
        }

        let mut fields = Record::new();
        fields.insert("status".into(), Value::from(TaskStatus::Deleted.as_str()));
        for field in ["title", "summary", "description"] {
            fields.insert(field.into(), Value::from(""));
        }
        self.backend.update(Table::Tasks, &task.key(), &fields)?;

        debug!(owner, list, task_id = id, "Task deleted");
        Ok(())
    }

    /// Physically remove deleted sentinels from one of the principal's lists.
    pub async fn compact(&self, principal: &Principal, owner: &str, list: &str) -> TaskerResult<usize> {
        if principal.is_anonymous() || principal.handle != owner {
            return Err(TaskerError::Forbidden(format!("not the owner of '{}'", list)));
        }
        let task_list = self.registry.get_list(owner, list)?;

        let filter = Filter::new()
            .eq("owner", owner)
            .eq("list", list)
            .eq("generation", task_list.generation.as_str())
            .eq("status", TaskStatus::Deleted.as_str());
        let records = self
            .backend
            .query(Table::Tasks, &filter, None, &Order::Unordered)?;

        for key in records
            .iter()
            .filter_map(|r| r.get(KEY_FIELD).and_then(Value::as_str))
        {
            self.backend.delete(Table::Tasks, key)?;
        }

        debug!(owner, list, removed = records.len(), "List compacted");
        Ok(records.len())
    }

    fn load(&self, list: &TaskList, id: TaskId) -> TaskerResult<Task> {
        let key = Task::record_key(&list.owner, &list.name, &list.generation, id);
        let record = self.backend.get(Table::Tasks, &key).map_err(|e| match e {
            TaskerError::NotFound(_) => TaskerError::NotFound(format!("task {}", key)),
            other => other,
        })?;
        from_record(record)
    }

    /// Make sure the list a write was checked against is still the live one.
    ///
    /// When it was deleted (or deleted and created again) while the write was
    /// in flight, the record is removed and the write reported as `NotFound`.
    fn confirm_list(&self, checked: &TaskList, key: &str) -> TaskerResult<()> {
        match self.registry.get_list(&checked.owner, &checked.name) {
            Ok(current) if current.generation == checked.generation => Ok(()),
            Ok(_) | Err(TaskerError::NotFound(_)) => {
                self.backend.delete(Table::Tasks, key)?;
                warn!(
                    owner = %checked.owner,
                    list = %checked.name,
                    key,
                    "List replaced during write, record discarded"
                );
                Err(TaskerError::NotFound(format!(
                    "list '{}/{}'",
                    checked.owner, checked.name
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn seal(&self, draft: &TaskDraft) -> TaskerResult<Sealed> {
        let fields = vec![
            draft.title.clone(),
            draft.summary.clone(),
            draft.description.clone(),
        ];
        let [title, summary, description]: [String; 3] = self
            .cipher
            .encrypt_all(fields)
            .await?
            .try_into()
            .map_err(|_| TaskerError::Cipher("field count mismatch".into()))?;
        Ok(Sealed {
            title,
            summary,
            description,
        })
    }

    fn check_read(&self, principal: &Principal, list: &TaskList) -> TaskerResult<()> {
        if can_read(list.permissions, &list.owner, &principal.handle) {
            Ok(())
        } else {
            Err(TaskerError::Forbidden(format!(
                "cannot read '{}/{}'",
                list.owner, list.name
            )))
        }
    }

    fn check_write(&self, principal: &Principal, list: &TaskList) -> TaskerResult<()> {
        if can_write(list.permissions, &principal.handle) {
            Ok(())
        } else {
            Err(TaskerError::Forbidden(format!(
                "cannot write '{}/{}'",
                list.owner, list.name
            )))
        }
    }
}
