//! List registry: each account's namespace of lists and their task counters.
//!
//! Lists are stored inside the owning account's record under
//! `lists.<name>`, so the next-task counter is addressed with the dotted path
//! `lists.<name>.task_number` and advanced with the backend's atomic
//! `increment`, never a local read-modify-write.

use serde_json::Value;
use tracing::debug;

use crate::accounts::load_account;
use crate::auth::Principal;
use crate::error::{TaskerError, TaskerResult};
use crate::permissions::{can_read, Permissions};
use crate::storage::{Filter, Order, Record, SharedBackend, Table, KEY_FIELD};
use crate::types::{Account, TaskId, TaskList};

/// Words that collide with front-end routes and cannot name a list
pub const RESERVED_NAMES: &[&str] = &[
    "login", "register", "logout", "profile", "reset", "newpass", "delete", "newlist", "new",
];

/// Handles kept for accounts the system creates itself
pub const RESERVED_HANDLES: &[&str] = &[crate::seed::PUBLIC_HANDLE];

/// Check a handle for self-service registration: a valid name that is not
/// one of the system accounts.
pub fn validate_handle(handle: &str) -> TaskerResult<()> {
    validate_name(handle)?;
    if RESERVED_HANDLES.contains(&handle.to_ascii_lowercase().as_str()) {
        return Err(TaskerError::InvalidName(format!("'{}' is reserved", handle)));
    }
    Ok(())
}

/// Check a list name (also used for account handles).
///
/// Rejects the empty string, reserved words, path separators, and `.`
/// (which would break dotted storage paths).
pub fn validate_name(name: &str) -> TaskerResult<()> {
    if name.trim().is_empty() {
        return Err(TaskerError::InvalidName("name is empty".into()));
    }
    if name.contains(['/', '\\', '.']) || name.chars().any(char::is_control) {
        return Err(TaskerError::InvalidName(format!(
            "'{}' contains a forbidden character",
            name
        )));
    }
    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(TaskerError::InvalidName(format!("'{}' is reserved", name)));
    }
    Ok(())
}

/// Per-account list namespace
#[derive(Clone)]
pub struct ListRegistry {
    backend: SharedBackend,
}

impl ListRegistry {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Create a list owned by `principal`.
    ///
    /// Grants ReadTask+WriteTask, plus PublicList when `is_public`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` without the CreateList account bit
    /// - `InvalidName` for reserved or malformed names
    /// - `NameUnavailable` when the account already has that list
    pub fn create_list(
        &self,
        principal: &Principal,
        name: &str,
        is_public: bool,
    ) -> TaskerResult<TaskList> {
        if principal.is_anonymous() || !principal.has(Permissions::CREATE_LIST) {
            return Err(TaskerError::Forbidden("cannot create lists".into()));
        }
        validate_name(name)?;

        let list = TaskList::new(name, &principal.handle, Permissions::for_new_list(is_public));
        self.backend
            .insert_at(
                Table::Accounts,
                &principal.handle,
                &Account::list_path(name),
                serde_json::to_value(&list)?,
            )
            .map_err(|e| match e {
                TaskerError::NameUnavailable(_) => {
                    TaskerError::NameUnavailable(format!("list '{}' already exists", name))
                }
                TaskerError::NotFound(_) => {
                    TaskerError::NotFound(format!("account '{}'", principal.handle))
                }
                other => other,
            })?;

        debug!(owner = %principal.handle, list = name, public = is_public, "List created");
        Ok(list)
    }

    /// Look up a list by owner and name.
    pub fn get_list(&self, owner: &str, name: &str) -> TaskerResult<TaskList> {
        let account = load_account(self.backend.as_ref(), owner)?;
        account
            .lists
            .get(name)
            .cloned()
            .ok_or_else(|| TaskerError::NotFound(format!("list '{}/{}'", owner, name)))
    }

    /// Every list `owner` has, ordered by name.
    pub fn lists_of(&self, owner: &str) -> TaskerResult<Vec<TaskList>> {
        let account = load_account(self.backend.as_ref(), owner)?;
        Ok(account.lists.into_values().collect())
    }

    /// The lists of `owner` that `principal` may read.
    pub fn visible_lists(&self, principal: &Principal, owner: &str) -> TaskerResult<Vec<TaskList>> {
        Ok(self
            .lists_of(owner)?
            .into_iter()
            .filter(|l| can_read(l.permissions, &l.owner, &principal.handle))
            .collect())
    }

    /// Replace a list's permission mask. Only the owner may do this.
    pub fn set_list_permissions(
        &self,
        principal: &Principal,
        name: &str,
        permissions: Permissions,
    ) -> TaskerResult<TaskList> {
        let mut list = self.get_list(&principal.handle, name)?;
        if principal.is_anonymous() || list.owner != principal.handle {
            return Err(TaskerError::Forbidden(format!("not the owner of '{}'", name)));
        }

        let mut fields = Record::new();
        fields.insert(
            format!("{}.permissions", Account::list_path(name)),
            serde_json::to_value(permissions)?,
        );
        self.backend
            .update(Table::Accounts, &principal.handle, &fields)?;

        list.permissions = permissions;
        debug!(owner = %principal.handle, list = name, %permissions, "List permissions changed");
        Ok(list)
    }

    /// Delete one of the principal's lists and every task in it.
    ///
    /// The account's default list cannot be deleted.
    pub fn delete_list(&self, principal: &Principal, name: &str) -> TaskerResult<()> {
        if principal.is_anonymous() || !principal.has(Permissions::DELETE_LIST) {
            return Err(TaskerError::Forbidden("cannot delete lists".into()));
        }
        let account = load_account(self.backend.as_ref(), &principal.handle)?;
        let Some(list) = account.lists.get(name) else {
            return Err(TaskerError::NotFound(format!(
                "list '{}/{}'",
                principal.handle, name
            )));
        };

        if account.config.default_list == name {
            return Err(TaskerError::ValidationFailed(format!(
                "'{}' is the default list",
                name
            )));
        }

        // Unlink first so in-flight creates can no longer reserve ids
        let mut fields = Record::new();
        fields.insert(Account::list_path(name), Value::Null);
        self.backend
            .update(Table::Accounts, &principal.handle, &fields)?;

        let removed = self.purge_tasks(&principal.handle, Some(list))?;

        debug!(owner = %principal.handle, list = name, removed, "List deleted");
        Ok(())
    }

    /// Atomically reserve the next task ordinal of a list.
    ///
    /// Returns the counter value before the increment, so sequential calls
    /// yield 0, 1, 2, ... and concurrent callers never share an id.
    pub fn reserve_task_id(&self, owner: &str, name: &str) -> TaskerResult<TaskId> {
        let next = self
            .backend
            .increment(
                Table::Accounts,
                owner,
                &Account::task_number_path(name),
                1,
            )
            .map_err(|e| match e {
                TaskerError::NotFound(_) => {
                    TaskerError::NotFound(format!("list '{}/{}'", owner, name))
                }
                other => other,
            })?;
        Ok((next - 1).max(0) as TaskId)
    }

    /// Physically remove the tasks of `owner` (optionally of one list
    /// generation).
    pub(crate) fn purge_tasks(&self, owner: &str, list: Option<&TaskList>) -> TaskerResult<usize> {
        let mut filter = Filter::new().eq("owner", owner);
        if let Some(list) = list {
            filter = filter
                .eq("list", list.name.as_str())
                .eq("generation", list.generation.as_str());
        }
        let records = self
            .backend
            .query(Table::Tasks, &filter, None, &Order::Unordered)?;

        for key in records
            .iter()
            .filter_map(|r| r.get(KEY_FIELD).and_then(Value::as_str))
        {
            self.backend.delete(Table::Tasks, key)?;
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_and_malformed_names() {
        for name in ["login", "LOGIN", "new", "a/b", "a\\b", "a.b", "", "  "] {
            assert!(
                matches!(validate_name(name), Err(TaskerError::InvalidName(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_system_handles_are_reserved() {
        assert!(validate_name("public").is_ok());
        for handle in ["public", "Public"] {
            assert!(matches!(
                validate_handle(handle),
                Err(TaskerError::InvalidName(_))
            ));
        }
        assert!(validate_handle("alice").is_ok());
    }

    #[test]
    fn test_valid_names() {
        for name in ["groceries", "work-2024", "Ideas", "my list"] {
            assert!(validate_name(name).is_ok(), "{:?} should be accepted", name);
        }
    }
}
