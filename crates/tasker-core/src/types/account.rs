//! Account Type - a registered identity owning lists

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::permissions::Permissions;
use crate::types::TaskList;

/// Name of the list every new account starts with
pub const DEFAULT_LIST: &str = "tasks";

/// Tasks shown per page unless the account overrides it
pub const DEFAULT_DISPLAY_LIMIT: usize = 5;

/// Per-account display preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Page size used when listing tasks
    pub task_display_limit: usize,
    /// List shown when none is named
    pub default_list: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            task_display_limit: DEFAULT_DISPLAY_LIMIT,
            default_list: DEFAULT_LIST.to_string(),
        }
    }
}

/// Active login session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Unix timestamp after which the token is rejected
    pub expires_at: i64,
}

/// A registered account
///
/// Stored as one record keyed by `handle`; lists live under `lists.<name>`
/// so their counters can be addressed with dotted paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique handle
    pub handle: String,
    pub email: String,
    /// Hex SHA-256 of the password
    pub pass_hash: String,
    /// Account-level grants
    pub permissions: Permissions,
    pub config: AccountConfig,
    /// Unix timestamp of registration
    pub created_at: i64,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub lists: BTreeMap<String, TaskList>,
}

impl Account {
    pub fn new(handle: impl Into<String>, email: impl Into<String>, pass_hash: String) -> Self {
        Self {
            handle: handle.into(),
            email: email.into(),
            pass_hash,
            permissions: Permissions::ACCOUNT_DEFAULT,
            config: AccountConfig::default(),
            created_at: chrono::Utc::now().timestamp(),
            session: None,
            lists: BTreeMap::new(),
        }
    }

    /// Dotted path of a list's task counter inside the account record.
    pub fn task_number_path(list: &str) -> String {
        format!("lists.{}.task_number", list)
    }

    /// Dotted path of a list entry inside the account record.
    pub fn list_path(list: &str) -> String {
        format!("lists.{}", list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_defaults() {
        let account = Account::new("alice", "alice@example.com", "abc".into());
        assert_eq!(account.permissions, Permissions::ACCOUNT_DEFAULT);
        assert_eq!(account.config.task_display_limit, 5);
        assert_eq!(account.config.default_list, "tasks");
        assert!(account.lists.is_empty());
        assert!(account.session.is_none());
    }

    #[test]
    fn test_paths() {
        assert_eq!(Account::task_number_path("work"), "lists.work.task_number");
        assert_eq!(Account::list_path("work"), "lists.work");
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let json = serde_json::json!({
            "handle": "bob",
            "email": "bob@example.com",
            "pass_hash": "00",
            "permissions": 2,
            "config": { "task_display_limit": 10, "default_list": "todo" },
            "created_at": 0
        });
        let account: Account = serde_json::from_value(json).unwrap();
        assert!(account.lists.is_empty());
        assert_eq!(account.config.task_display_limit, 10);
    }
}
