//! Core types for Tasker

pub mod account;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TaskerError;
use crate::permissions::Permissions;

pub use account::{Account, AccountConfig, Session};

/// Ordinal of a task within one list, assigned from the list's counter
pub type TaskId = u64;

/// Status of a task
///
/// `Deleted` is terminal: it is only ever set by the task store's delete and
/// every listing path filters it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Active,
    Blocked,
    Done,
    Deleted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "Active",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Done => "Done",
            TaskStatus::Deleted => "Deleted",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, TaskStatus::Deleted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "active" => Ok(TaskStatus::Active),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            "deleted" => Ok(TaskStatus::Deleted),
            other => Err(TaskerError::ValidationFailed(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

/// A single item of a list
///
/// Identity is `(id, list, owner)`. `title`, `summary` and `description`
/// hold ciphertext while at rest and plaintext only inside a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Ordinal within the list
    pub id: TaskId,
    /// Name of the list this task belongs to
    pub list: String,
    /// Handle of the account owning the list
    pub owner: String,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub status: TaskStatus,
    /// Handle of the account that created the task
    pub creator: String,
    /// Unix timestamp of creation
    pub created_at: i64,
    /// Optional due date (Unix timestamp)
    pub due: Option<i64>,
    /// Generation of the list the task was created in
    #[serde(default)]
    pub generation: String,
}

impl Task {
    /// Storage key of a task: `owner/list/generation/id`, or `owner/list/id`
    /// for a list without a generation.
    ///
    /// Neither handles nor list names may contain `/`, so keys are unique.
    pub fn record_key(owner: &str, list: &str, generation: &str, id: TaskId) -> String {
        if generation.is_empty() {
            format!("{}/{}/{}", owner, list, id)
        } else {
            format!("{}/{}/{}/{}", owner, list, generation, id)
        }
    }

    pub fn key(&self) -> String {
        Self::record_key(&self.owner, &self.list, &self.generation, self.id)
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }
}

/// Caller-supplied content for a new or edited task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub summary: String,
    /// Optional long-form text
    pub description: String,
    pub status: TaskStatus,
    /// Override of the creation timestamp (edits may move a task in time)
    pub created_at: Option<i64>,
    pub due: Option<i64>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_due(mut self, due: i64) -> Self {
        self.due = Some(due);
        self
    }

    /// Only the description may be empty.
    pub fn validate(&self) -> Result<(), TaskerError> {
        if self.title.trim().is_empty() {
            return Err(TaskerError::ValidationFailed("title is required".into()));
        }
        if self.summary.trim().is_empty() {
            return Err(TaskerError::ValidationFailed("summary is required".into()));
        }
        if self.status.is_deleted() {
            return Err(TaskerError::ValidationFailed(
                "status 'Deleted' is reserved for deletion".into(),
            ));
        }
        Ok(())
    }
}

/// A named list owned by one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    /// Unique within the owning account
    pub name: String,
    /// Handle of the owning account
    pub owner: String,
    pub permissions: Permissions,
    /// Unix timestamp of creation
    pub created_at: i64,
    /// Next task ordinal; always above the highest assigned id
    pub task_number: TaskId,
    /// Fresh on every creation, so a list deleted and created again under
    /// the same name never sees the old list's tasks
    #[serde(default)]
    pub generation: String,
}

impl TaskList {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, permissions: Permissions) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            permissions,
            created_at: chrono::Utc::now().timestamp(),
            task_number: 0,
            generation: ulid::Ulid::new().to_string(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.permissions.has(Permissions::PUBLIC_LIST)
    }
}
