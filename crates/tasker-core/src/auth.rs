//! Authentication contract.
//!
//! Every task store and list registry call takes the [`Principal`] produced
//! here: the requester's handle and account-level permission bits.

use sha2::{Digest, Sha256};

use crate::error::TaskerResult;
use crate::permissions::Permissions;

/// Alphabet session tokens are drawn from
pub const TOKEN_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWabcdefghijklmnopqrstuvw1234567890/_.";

/// Session token length in characters
pub const TOKEN_LEN: usize = 128;

/// An authenticated (or anonymous) requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Account handle; empty for anonymous readers
    pub handle: String,
    /// Account-level grants
    pub permissions: Permissions,
}

impl Principal {
    pub fn new(handle: impl Into<String>, permissions: Permissions) -> Self {
        Self {
            handle: handle.into(),
            permissions,
        }
    }

    /// A requester without a session. Can only read public lists.
    pub fn anonymous() -> Self {
        Self {
            handle: String::new(),
            permissions: Permissions::NONE,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.handle.is_empty()
    }

    pub fn has(&self, flag: Permissions) -> bool {
        self.permissions.has(flag)
    }
}

/// Resolves request credentials into a principal
///
/// Fails with `TaskerError::Unauthorized` for unknown credentials and
/// `TaskerError::TokenExpired` for sessions past their expiry.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> TaskerResult<Principal>;
}

/// Hex SHA-256 of a password, the stored credential form.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Fresh random session token.
pub fn generate_token() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; TOKEN_LEN];
    rand::rng().fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| TOKEN_CHARS[*b as usize % TOKEN_CHARS.len()] as char)
        .collect()
}
