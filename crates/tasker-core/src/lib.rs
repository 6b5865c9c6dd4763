//! Tasker Core Library
//!
//! Multi-tenant task lists with per-list permissions and field-level
//! encryption.
//!
//! ## Overview
//!
//! Accounts own named lists; lists hold tasks. Every list carries a
//! permission bitmask deciding who may read and write it, and every task's
//! title, summary and description are stored RSA-OAEP encrypted. Pages are
//! selected by task ordinal and shown newest first.
//!
//! ## Core Pieces
//!
//! - **Field cipher**: [`FieldCipher`], one process-wide key pair
//! - **Permissions**: [`Permissions`] bit flags and the read/write rules
//! - **Storage**: the [`Backend`] contract with redb and snapshot backends
//! - **Services**: [`AccountService`], [`ListRegistry`], [`TaskStore`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use tasker_core::{Tasker, TaskerConfig, TaskDraft};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tasker = Tasker::open(TaskerConfig::default().apply_env()?)?;
//!     let alice = tasker.principal_for("alice")?;
//!
//!     tasker.tasks().create(&alice, "alice", "tasks", TaskDraft::new("Plant garden", "Spring")).await?;
//!
//!     for task in tasker.tasks().fetch_page(&alice, "alice", "tasks", 0, 5).await? {
//!         println!("{} [{}] {}", task.id, task.status, task.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod pagination;
pub mod permissions;
pub mod registry;
pub mod rekey;
pub mod seed;
pub mod storage;
pub mod tasks;
pub mod types;

// Re-exports
pub use accounts::AccountService;
pub use auth::{Authenticator, Principal};
pub use config::TaskerConfig;
pub use crypto::{decrypt_field, encrypt_field, FieldCipher};
pub use engine::Tasker;
pub use error::{TaskerError, TaskerResult};
pub use pagination::PageWindow;
pub use permissions::{can_read, can_write, has_permission, Permissions};
pub use registry::ListRegistry;
pub use rekey::RotationReport;
pub use storage::{Backend, BackendKind, RedbBackend, SharedBackend, SnapshotBackend};
pub use tasks::TaskStore;
pub use types::{Account, AccountConfig, Session, Task, TaskDraft, TaskId, TaskList, TaskStatus};
