//! Accounts: registration, sessions, preferences and deletion.
//!
//! [`AccountService`] is also the crate's [`Authenticator`]: session tokens
//! issued by `login` resolve back into a [`Principal`].

use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{generate_token, hash_password, Authenticator, Principal};
use crate::error::{TaskerError, TaskerResult};
use crate::permissions::Permissions;
use crate::registry::{validate_handle, validate_name, ListRegistry};
use crate::storage::{from_record, to_record, Backend, Filter, Order, Record, SharedBackend, Table};
use crate::types::{Account, AccountConfig, Session, TaskList};

/// Sessions last five days unless configured otherwise
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 120;

/// Load and decode an account record.
pub(crate) fn load_account(backend: &dyn Backend, handle: &str) -> TaskerResult<Account> {
    let record = backend.get(Table::Accounts, handle).map_err(|e| match e {
        TaskerError::NotFound(_) => TaskerError::NotFound(format!("account '{}'", handle)),
        other => other,
    })?;
    from_record(record)
}

/// Account lifecycle and session handling
#[derive(Clone)]
pub struct AccountService {
    backend: SharedBackend,
    registry: ListRegistry,
    session_ttl: chrono::Duration,
    /// Preferences and default list name given to new accounts
    defaults: AccountConfig,
}

impl AccountService {
    pub fn new(backend: SharedBackend, session_ttl_hours: i64) -> Self {
        Self {
            registry: ListRegistry::new(backend.clone()),
            backend,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            defaults: AccountConfig::default(),
        }
    }

    /// Use `defaults` as the starting preferences of every new account.
    pub fn with_account_defaults(mut self, defaults: AccountConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Register a new account with its default list.
    ///
    /// The account starts with the service's default preferences, and its
    /// first list is named after the default list.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` when a field is empty or the defaults are unusable
    /// - `InvalidName` when the handle is reserved or malformed
    /// - `NameUnavailable` when the handle is taken
    pub fn register(&self, handle: &str, email: &str, password: &str) -> TaskerResult<Account> {
        if handle.is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(TaskerError::ValidationFailed("empty fields".into()));
        }
        validate_handle(handle)?;
        if self.defaults.task_display_limit == 0 {
            return Err(TaskerError::ValidationFailed(
                "display limit must be positive".into(),
            ));
        }
        validate_name(&self.defaults.default_list)
            .map_err(|e| TaskerError::ValidationFailed(format!("default list: {}", e)))?;

        let mut account = Account::new(handle, email.trim(), hash_password(password));
        account.config = self.defaults.clone();
        let default_list = TaskList::new(
            account.config.default_list.clone(),
            handle,
            Permissions::for_new_list(false),
        );
        account
            .lists
            .insert(default_list.name.clone(), default_list);

        self.store_new(&account)?;

        info!(handle, "Account registered");
        Ok(account)
    }

    /// Store a fully-formed account as-is (seeding, imports).
    pub fn insert(&self, account: &Account) -> TaskerResult<()> {
        validate_name(&account.handle)?;
        self.store_new(account)
    }

    /// Write an account record unless the handle is already taken.
    fn store_new(&self, account: &Account) -> TaskerResult<()> {
        self.backend
            .insert(Table::Accounts, to_record(account, &account.handle)?)
            .map_err(|e| match e {
                TaskerError::NameUnavailable(_) => {
                    TaskerError::NameUnavailable(format!("handle '{}' is taken", account.handle))
                }
                other => other,
            })?;
        Ok(())
    }

    pub fn get_account(&self, handle: &str) -> TaskerResult<Account> {
        load_account(self.backend.as_ref(), handle)
    }

    /// Check credentials and open a new session.
    pub fn login(&self, handle: &str, password: &str) -> TaskerResult<Session> {
        if handle.is_empty() || password.is_empty() {
            return Err(TaskerError::ValidationFailed("empty fields".into()));
        }
        let account = match load_account(self.backend.as_ref(), handle) {
            Ok(account) => account,
            Err(TaskerError::NotFound(_)) => return Err(TaskerError::Unauthorized),
            Err(e) => return Err(e),
        };
        if account.pass_hash != hash_password(password) {
            return Err(TaskerError::Unauthorized);
        }

        let session = Session {
            token: generate_token(),
            expires_at: (chrono::Utc::now() + self.session_ttl).timestamp(),
        };
        let mut fields = Record::new();
        fields.insert("session".into(), serde_json::to_value(&session)?);
        self.backend.update(Table::Accounts, handle, &fields)?;

        debug!(handle, expires_at = session.expires_at, "Session opened");
        Ok(session)
    }

    /// End the session identified by `token`. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) -> TaskerResult<()> {
        if let Some(account) = self.find_by_token(token)? {
            let mut fields = Record::new();
            fields.insert("session".into(), Value::Null);
            self.backend
                .update(Table::Accounts, &account.handle, &fields)?;
            debug!(handle = %account.handle, "Session closed");
        }
        Ok(())
    }

    /// Change display preferences. The default list must exist.
    pub fn update_config(&self, principal: &Principal, config: AccountConfig) -> TaskerResult<()> {
        if principal.is_anonymous() {
            return Err(TaskerError::Unauthorized);
        }
        if config.task_display_limit == 0 {
            return Err(TaskerError::ValidationFailed(
                "display limit must be positive".into(),
            ));
        }
        let account = load_account(self.backend.as_ref(), &principal.handle)?;
        if !account.lists.contains_key(&config.default_list) {
            return Err(TaskerError::NotFound(format!(
                "list '{}/{}'",
                principal.handle, config.default_list
            )));
        }

        let mut fields = Record::new();
        fields.insert("config".into(), serde_json::to_value(&config)?);
        self.backend
            .update(Table::Accounts, &principal.handle, &fields)
    }

    pub fn change_password(
        &self,
        principal: &Principal,
        old_password: &str,
        new_password: &str,
    ) -> TaskerResult<()> {
        if new_password.is_empty() {
            return Err(TaskerError::ValidationFailed("empty password".into()));
        }
        let account = load_account(self.backend.as_ref(), &principal.handle)?;
        if account.pass_hash != hash_password(old_password) {
            return Err(TaskerError::Unauthorized);
        }

        let mut fields = Record::new();
        fields.insert("pass_hash".into(), Value::String(hash_password(new_password)));
        self.backend
            .update(Table::Accounts, &principal.handle, &fields)
    }

    /// Delete an account with every list and task it owns.
    ///
    /// Only the account itself may do this, and only with DeleteAccount.
    pub fn delete_account(&self, principal: &Principal, handle: &str) -> TaskerResult<()> {
        if principal.handle != handle || !principal.has(Permissions::DELETE_ACCOUNT) {
            return Err(TaskerError::Forbidden(format!(
                "cannot delete account '{}'",
                handle
            )));
        }
        load_account(self.backend.as_ref(), handle)?;

        let removed = self.registry.purge_tasks(handle, None)?;
        self.backend.delete(Table::Accounts, handle)?;

        info!(handle, removed, "Account deleted");
        Ok(())
    }

    fn find_by_token(&self, token: &str) -> TaskerResult<Option<Account>> {
        if token.is_empty() {
            return Ok(None);
        }
        let records = self.backend.query(
            Table::Accounts,
            &Filter::new().eq("session.token", token),
            Some(1),
            &Order::Unordered,
        )?;
        records.into_iter().next().map(from_record).transpose()
    }
}

impl Authenticator for AccountService {
    fn authenticate(&self, token: &str) -> TaskerResult<Principal> {
        let account = self.find_by_token(token)?.ok_or(TaskerError::Unauthorized)?;
        let session = account.session.as_ref().ok_or(TaskerError::Unauthorized)?;
        if session.expires_at < chrono::Utc::now().timestamp() {
            return Err(TaskerError::TokenExpired);
        }
        Ok(Principal::new(account.handle, account.permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RedbBackend, SnapshotBackend};
    use std::sync::Arc;

    fn service() -> AccountService {
        AccountService::new(Arc::new(SnapshotBackend::in_memory()), DEFAULT_SESSION_TTL_HOURS)
    }

    #[test]
    fn test_register_creates_default_list() {
        let accounts = service();
        let account = accounts.register("alice", "alice@example.com", "hunter2").unwrap();

        assert_eq!(account.lists.len(), 1);
        let list = &account.lists["tasks"];
        assert_eq!(list.owner, "alice");
        assert_eq!(list.task_number, 0);
        assert_ne!(account.pass_hash, "hunter2");
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_input() {
        let accounts = service();
        accounts.register("alice", "a@example.com", "pw").unwrap();

        assert!(matches!(
            accounts.register("alice", "b@example.com", "pw"),
            Err(TaskerError::NameUnavailable(_))
        ));
        assert!(matches!(
            accounts.register("bob", "", "pw"),
            Err(TaskerError::ValidationFailed(_))
        ));
        assert!(matches!(
            accounts.register("login", "l@example.com", "pw"),
            Err(TaskerError::InvalidName(_))
        ));
    }

    #[test]
    fn test_system_handle_cannot_be_registered() {
        let accounts = service();
        assert!(matches!(
            accounts.register("public", "p@example.com", "pw"),
            Err(TaskerError::InvalidName(_))
        ));

        // Seeding still stores it
        let system = Account::new("public", "", hash_password(""));
        accounts.insert(&system).unwrap();
        assert!(matches!(
            accounts.insert(&system),
            Err(TaskerError::NameUnavailable(_))
        ));
    }

    #[test]
    fn test_register_uses_configured_defaults() {
        let accounts = service().with_account_defaults(AccountConfig {
            task_display_limit: 12,
            default_list: "inbox".into(),
        });
        let account = accounts.register("alice", "a@example.com", "pw").unwrap();

        assert_eq!(account.config.task_display_limit, 12);
        assert_eq!(account.config.default_list, "inbox");
        assert_eq!(account.lists.keys().collect::<Vec<_>>(), vec!["inbox"]);

        let stored = accounts.get_account("alice").unwrap();
        assert_eq!(stored.config, account.config);
        assert!(stored.lists.contains_key("inbox"));
    }

    #[test]
    fn test_register_rejects_unusable_defaults() {
        for defaults in [
            AccountConfig {
                task_display_limit: 0,
                default_list: "tasks".into(),
            },
            AccountConfig {
                task_display_limit: 5,
                default_list: "a.b".into(),
            },
        ] {
            let accounts = service().with_account_defaults(defaults);
            assert!(matches!(
                accounts.register("alice", "a@example.com", "pw"),
                Err(TaskerError::ValidationFailed(_))
            ));
        }
    }

    #[test]
    fn test_concurrent_registrations_have_one_winner() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(RedbBackend::open(dir.path().join("t.redb")).unwrap());
        let accounts = AccountService::new(backend, DEFAULT_SESSION_TTL_HOURS);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let accounts = accounts.clone();
                std::thread::spawn(move || {
                    accounts
                        .register("alice", "a@example.com", &format!("pw{}", i))
                        .map(|_| i)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, TaskerError::NameUnavailable(_))));

        // The first registrant's credentials survived
        assert!(accounts.login("alice", &format!("pw{}", winners[0])).is_ok());
    }

    #[test]
    fn test_login_and_authenticate() {
        let accounts = service();
        accounts.register("alice", "a@example.com", "pw").unwrap();

        assert!(matches!(
            accounts.login("alice", "wrong"),
            Err(TaskerError::Unauthorized)
        ));
        assert!(matches!(
            accounts.login("nobody", "pw"),
            Err(TaskerError::Unauthorized)
        ));

        let session = accounts.login("alice", "pw").unwrap();
        let principal = accounts.authenticate(&session.token).unwrap();
        assert_eq!(principal.handle, "alice");
        assert_eq!(principal.permissions, Permissions::ACCOUNT_DEFAULT);

        assert!(matches!(
            accounts.authenticate("not-a-token"),
            Err(TaskerError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_session() {
        let accounts = AccountService::new(Arc::new(SnapshotBackend::in_memory()), -1);
        accounts.register("alice", "a@example.com", "pw").unwrap();
        let session = accounts.login("alice", "pw").unwrap();

        assert!(matches!(
            accounts.authenticate(&session.token),
            Err(TaskerError::TokenExpired)
        ));
    }

    #[test]
    fn test_logout_invalidates_token() {
        let accounts = service();
        accounts.register("alice", "a@example.com", "pw").unwrap();
        let session = accounts.login("alice", "pw").unwrap();

        accounts.logout(&session.token).unwrap();
        assert!(matches!(
            accounts.authenticate(&session.token),
            Err(TaskerError::Unauthorized)
        ));
        // Unknown tokens are fine
        accounts.logout("whatever").unwrap();
    }

    #[test]
    fn test_update_config() {
        let accounts = service();
        accounts.register("alice", "a@example.com", "pw").unwrap();
        let alice = Principal::new("alice", Permissions::ACCOUNT_DEFAULT);

        let config = AccountConfig {
            task_display_limit: 20,
            default_list: "tasks".into(),
        };
        accounts.update_config(&alice, config.clone()).unwrap();
        assert_eq!(accounts.get_account("alice").unwrap().config, config);

        let missing = AccountConfig {
            task_display_limit: 20,
            default_list: "nope".into(),
        };
        assert!(accounts.update_config(&alice, missing).is_err());
    }

    #[test]
    fn test_change_password() {
        let accounts = service();
        accounts.register("alice", "a@example.com", "old").unwrap();
        let alice = Principal::new("alice", Permissions::ACCOUNT_DEFAULT);

        assert!(accounts.change_password(&alice, "wrong", "new").is_err());
        accounts.change_password(&alice, "old", "new").unwrap();
        assert!(accounts.login("alice", "old").is_err());
        assert!(accounts.login("alice", "new").is_ok());
    }

    #[test]
    fn test_delete_account_requires_self_and_bit() {
        let accounts = service();
        accounts.register("alice", "a@example.com", "pw").unwrap();

        let bob = Principal::new("bob", Permissions::ACCOUNT_DEFAULT);
        assert!(matches!(
            accounts.delete_account(&bob, "alice"),
            Err(TaskerError::Forbidden(_))
        ));

        let restricted = Principal::new("alice", Permissions::READ_TASK);
        assert!(matches!(
            accounts.delete_account(&restricted, "alice"),
            Err(TaskerError::Forbidden(_))
        ));

        let alice = Principal::new("alice", Permissions::ACCOUNT_DEFAULT);
        accounts.delete_account(&alice, "alice").unwrap();
        assert!(matches!(
            accounts.get_account("alice"),
            Err(TaskerError::NotFound(_))
        ));
    }
}
