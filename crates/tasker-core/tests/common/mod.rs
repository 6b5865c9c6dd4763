//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use tasker_core::{
    FieldCipher, Permissions, Principal, RedbBackend, SharedBackend, SnapshotBackend, Tasker,
    TaskerConfig,
};
use tempfile::TempDir;

/// Key generation dominates test time, so each binary makes two keys once.
pub fn test_cipher() -> FieldCipher {
    static KEY: OnceLock<FieldCipher> = OnceLock::new();
    KEY.get_or_init(|| FieldCipher::generate(1024).unwrap()).clone()
}

pub fn second_cipher() -> FieldCipher {
    static KEY: OnceLock<FieldCipher> = OnceLock::new();
    KEY.get_or_init(|| FieldCipher::generate(1024).unwrap()).clone()
}

/// In-memory instance for fast tests
pub fn memory_tasker() -> Tasker {
    let backend: SharedBackend = Arc::new(SnapshotBackend::in_memory());
    Tasker::with_parts(TaskerConfig::default(), backend, test_cipher())
}

/// redb-backed instance; keep the TempDir alive for the test's duration
pub fn redb_tasker() -> (Tasker, TempDir) {
    let dir = TempDir::new().unwrap();
    let backend: SharedBackend = Arc::new(RedbBackend::open(dir.path().join("tasker.redb")).unwrap());
    let config = TaskerConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    (Tasker::with_parts(config, backend, test_cipher()), dir)
}

/// Register `handle` and return its principal.
pub fn register(tasker: &Tasker, handle: &str) -> Principal {
    tasker
        .accounts()
        .register(handle, &format!("{}@example.com", handle), "password")
        .unwrap();
    Principal::new(handle, Permissions::ACCOUNT_DEFAULT)
}
