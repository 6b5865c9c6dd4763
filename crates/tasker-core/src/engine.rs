//! Tasker - the primary entry point
//!
//! Tasker owns the process-wide pieces (storage backend and key pair) and
//! hands them to the services that need them:
//! - [`AccountService`] for registration, sessions and authentication
//! - [`ListRegistry`] for list namespaces and task counters
//! - [`TaskStore`] for encrypted task records
//!
//! # Example
//!
//! ```ignore
//! use tasker_core::{Tasker, TaskerConfig, TaskDraft};
//!
//! let tasker = Tasker::open(TaskerConfig::default().apply_env()?)?;
//! tasker.accounts().register("alice", "alice@example.com", "hunter2")?;
//! let session = tasker.accounts().login("alice", "hunter2")?;
//! let alice = tasker.authenticate(&session.token)?;
//!
//! tasker
//!     .tasks()
//!     .create(&alice, "alice", "tasks", TaskDraft::new("Plant garden", "Tomatoes first"))
//!     .await?;
//! ```

use tracing::info;

use crate::accounts::AccountService;
use crate::auth::{Authenticator, Principal};
use crate::config::TaskerConfig;
use crate::crypto::FieldCipher;
use crate::error::TaskerResult;
use crate::registry::ListRegistry;
use crate::rekey::{self, RotationReport};
use crate::seed;
use crate::storage::SharedBackend;
use crate::tasks::TaskStore;
use crate::types::Account;

/// Wired set of services sharing one backend and one key pair
#[derive(Clone)]
pub struct Tasker {
    config: TaskerConfig,
    backend: SharedBackend,
    accounts: AccountService,
    registry: ListRegistry,
    tasks: TaskStore,
}

impl Tasker {
    /// Open the configured backend and parse the configured key.
    ///
    /// # Errors
    ///
    /// Returns `TaskerError::InvalidKey` if no usable key is configured and
    /// storage errors if the backend cannot be opened.
    pub fn open(config: TaskerConfig) -> TaskerResult<Self> {
        let cipher = config.load_cipher()?;
        let backend = config.open_backend()?;
        info!(data_dir = ?config.data_dir, key_bits = cipher.key_bits(), "Tasker ready");
        Ok(Self::with_parts(config, backend, cipher))
    }

    /// Assemble from an already opened backend and key.
    pub fn with_parts(config: TaskerConfig, backend: SharedBackend, cipher: FieldCipher) -> Self {
        Self {
            accounts: AccountService::new(backend.clone(), config.session_ttl_hours)
                .with_account_defaults(config.account_defaults()),
            registry: ListRegistry::new(backend.clone()),
            tasks: TaskStore::new(backend.clone(), cipher),
            backend,
            config,
        }
    }

    pub fn config(&self) -> &TaskerConfig {
        &self.config
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn cipher(&self) -> &FieldCipher {
        self.tasks.cipher()
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn registry(&self) -> &ListRegistry {
        &self.registry
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    /// Resolve a session token. An empty token is the anonymous reader.
    pub fn authenticate(&self, token: &str) -> TaskerResult<Principal> {
        if token.is_empty() {
            return Ok(Principal::anonymous());
        }
        self.accounts.authenticate(token)
    }

    /// Principal for a handle without a session (trusted local callers).
    pub fn principal_for(&self, handle: &str) -> TaskerResult<Principal> {
        let account = self.accounts.get_account(handle)?;
        Ok(Principal::new(account.handle, account.permissions))
    }

    /// Create the `public` account with the standard welcome tasks.
    pub async fn seed_public(&self) -> TaskerResult<Account> {
        seed::seed_public_account(
            &self.accounts,
            &self.registry,
            &self.tasks,
            seed::welcome_tasks(),
        )
        .await
    }

    /// Re-encrypt all stored tasks from this instance's key to `new`.
    ///
    /// The returned instance uses the new key.
    pub fn rotate_key(self, new: FieldCipher) -> TaskerResult<(Self, RotationReport)> {
        let report = rekey::rotate(self.backend.as_ref(), self.cipher(), &new)?;
        let config = self.config;
        Ok((Self::with_parts(config, self.backend, new), report))
    }

    /// Release the backend. Pending writes are already durable; this only
    /// logs and drops the handles.
    pub fn shutdown(self) {
        info!(data_dir = ?self.config.data_dir, "Tasker shut down");
    }
}

impl std::fmt::Debug for Tasker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tasker")
            .field("config", &self.config)
            .field("cipher", self.cipher())
            .finish_non_exhaustive()
    }
}
