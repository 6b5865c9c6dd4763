//! Runtime configuration.
//!
//! Loaded from an optional JSON file, then overridden by environment
//! variables. The private key is only ever held as text here and parsed by
//! [`TaskerConfig::load_cipher`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounts::DEFAULT_SESSION_TTL_HOURS;
use crate::crypto::FieldCipher;
use crate::error::{TaskerError, TaskerResult};
use crate::storage::{BackendKind, RedbBackend, SharedBackend, SnapshotBackend};
use crate::types::account::{AccountConfig, DEFAULT_DISPLAY_LIMIT, DEFAULT_LIST};

/// Data directory override
pub const ENV_DATA_DIR: &str = "TASKER_DATA_DIR";
/// Backend override (`redb` or `snapshot`)
pub const ENV_BACKEND: &str = "TASKER_BACKEND";
/// Base64 PKCS#1 private key
pub const ENV_KEY: &str = "TASKER_KEY";
/// Key variable of older deployments, read when `TASKER_KEY` is unset
pub const ENV_KEY_LEGACY: &str = "KEY";

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskerConfig {
    /// Directory holding the database file
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    /// Base64-encoded PKCS#1 DER private key
    pub key: Option<String>,
    /// Page size new accounts start with
    pub default_display_limit: usize,
    /// Name of the list every new account is created with
    pub default_list: String,
    pub session_ttl_hours: i64,
}

impl Default for TaskerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".tasker"),
            backend: BackendKind::default(),
            key: None,
            default_display_limit: DEFAULT_DISPLAY_LIMIT,
            default_list: DEFAULT_LIST.to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

impl TaskerConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> TaskerResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> TaskerResult<Self> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env_from<F>(mut self, lookup: F) -> TaskerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(kind) = lookup(ENV_BACKEND).filter(|v| !v.is_empty()) {
            self.backend = kind.parse()?;
        }
        if let Some(key) = lookup(ENV_KEY)
            .or_else(|| lookup(ENV_KEY_LEGACY))
            .filter(|v| !v.trim().is_empty())
        {
            self.key = Some(key);
        }
        Ok(self)
    }

    /// Path of the database file for the configured backend.
    pub fn database_path(&self) -> PathBuf {
        match self.backend {
            BackendKind::Redb => self.data_dir.join("tasker.redb"),
            BackendKind::Snapshot => self.data_dir.join("tasker.json"),
        }
    }

    /// Open the configured storage backend, creating it if needed.
    pub fn open_backend(&self) -> TaskerResult<SharedBackend> {
        let path = self.database_path();
        info!(?path, backend = ?self.backend, "Opening storage");
        Ok(match self.backend {
            BackendKind::Redb => Arc::new(RedbBackend::open(&path)?),
            BackendKind::Snapshot => Arc::new(SnapshotBackend::open(&path)?),
        })
    }

    /// Preferences given to newly registered accounts.
    pub fn account_defaults(&self) -> AccountConfig {
        AccountConfig {
            task_display_limit: self.default_display_limit,
            default_list: self.default_list.clone(),
        }
    }

    /// Parse the configured private key.
    pub fn load_cipher(&self) -> TaskerResult<FieldCipher> {
        let key = self.key.as_deref().ok_or_else(|| {
            TaskerError::InvalidKey(format!("no key configured (set {})", ENV_KEY))
        })?;
        FieldCipher::from_base64_pkcs1(key)
    }
}

impl std::fmt::Debug for TaskerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskerConfig")
            .field("data_dir", &self.data_dir)
            .field("backend", &self.backend)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("default_display_limit", &self.default_display_limit)
            .field("default_list", &self.default_list)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .finish()
    }
}
