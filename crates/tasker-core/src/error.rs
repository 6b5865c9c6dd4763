//! Error types for Tasker

use thiserror::Error;

/// Main error type for Tasker operations
#[derive(Error, Debug)]
pub enum TaskerError {
    /// Requester lacks the permission bit the operation needs
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Account, list or task does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// List name is reserved or contains a path separator
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// List or account name already taken
    #[error("Name unavailable: {0}")]
    NameUnavailable(String),

    /// Plaintext does not fit in a single RSA-OAEP block
    #[error("Field of {len} bytes exceeds cipher capacity of {max} bytes")]
    EncodingTooLarge { len: usize, max: usize },

    /// Decryption failed (wrong key, tampered data, or malformed input)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// A cipher worker panicked or was cancelled before finishing
    #[error("Cipher worker failed: {0}")]
    Cipher(String),

    /// Caller supplied an incomplete or malformed value
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// No valid session for the supplied credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Session token exists but has expired
    #[error("Session token expired")]
    TokenExpired,

    /// Key material could not be parsed or generated
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Backend storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskerError {
    /// Whether this error is an internal failure that callers should see
    /// only as a generic message (storage pass-through and cipher failures).
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            TaskerError::DecryptionFailed(_)
                | TaskerError::Cipher(_)
                | TaskerError::InvalidKey(_)
                | TaskerError::Storage(_)
                | TaskerError::Database(_)
                | TaskerError::Transaction(_)
                | TaskerError::Table(_)
                | TaskerError::StorageOp(_)
                | TaskerError::Commit(_)
                | TaskerError::Serialization(_)
                | TaskerError::Io(_)
        )
    }

    /// Message safe to show to the requester.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal error, please try again later".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Result type alias using TaskerError
pub type TaskerResult<T> = Result<T, TaskerError>;
