//! Permission bitmasks
//!
//! One integer type serves both account-level grants (what an account may do:
//! create lists, delete lists, delete itself) and list-level grants (who may
//! read or write the tasks of a list).
//!
//! ## Access rules
//!
//! - **Read**: the list has `READ_TASK` or `PUBLIC_LIST`, or the requester
//!   owns it. Anonymous requesters only see `PUBLIC_LIST` lists.
//!   `READ_TASK` is not scoped to the owner: a list with `LIST_DEFAULT` is
//!   readable by every signed-in account. Only a mask without `READ_TASK`
//!   keeps a list to its owner.
//! - **Write**: gated strictly by the list's `WRITE_TASK` bit. Ownership
//!   does not bypass it, so clearing the bit freezes a list for everyone.
//!   Like `READ_TASK`, it applies to every signed-in account, so a
//!   `LIST_DEFAULT` list is shared for writing too. Anonymous requesters
//!   never write.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// Bitmask of capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub u32);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);

    // task related
    pub const READ_TASK: Permissions = Permissions(1 << 1);
    pub const WRITE_TASK: Permissions = Permissions(1 << 2);

    // list related
    pub const PUBLIC_LIST: Permissions = Permissions(1 << 3);

    // account related
    pub const DELETE_ACCOUNT: Permissions = Permissions(1 << 4);
    pub const CREATE_LIST: Permissions = Permissions(1 << 5);
    pub const DELETE_LIST: Permissions = Permissions(1 << 6);

    /// Grants given to a freshly registered account
    pub const ACCOUNT_DEFAULT: Permissions = Permissions(
        Self::READ_TASK.0
            | Self::WRITE_TASK.0
            | Self::CREATE_LIST.0
            | Self::DELETE_LIST.0
            | Self::DELETE_ACCOUNT.0,
    );

    /// Grants given to a freshly created list
    pub const LIST_DEFAULT: Permissions = Permissions(Self::READ_TASK.0 | Self::WRITE_TASK.0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Permissions(bits)
    }

    /// True when every bit of `flag` is set.
    pub const fn has(self, flag: Permissions) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub const fn with(self, flag: Permissions) -> Self {
        Permissions(self.0 | flag.0)
    }

    pub const fn without(self, flag: Permissions) -> Self {
        Permissions(self.0 & !flag.0)
    }

    /// Default grants for a new list, plus `PUBLIC_LIST` when requested.
    pub const fn for_new_list(public: bool) -> Self {
        if public {
            Self::LIST_DEFAULT.with(Self::PUBLIC_LIST)
        } else {
            Self::LIST_DEFAULT
        }
    }
}

/// Bitwise test of `flag` in `mask`.
pub fn has_permission(mask: Permissions, flag: Permissions) -> bool {
    mask.has(flag)
}

/// Whether `requester` (empty for anonymous) may read tasks of a list.
pub fn can_read(list_mask: Permissions, list_owner: &str, requester: &str) -> bool {
    if list_mask.has(Permissions::PUBLIC_LIST) {
        return true;
    }
    if requester.is_empty() {
        return false;
    }
    list_mask.has(Permissions::READ_TASK) || requester == list_owner
}

/// Whether `requester` may create, edit or delete tasks of a list.
pub fn can_write(list_mask: Permissions, requester: &str) -> bool {
    !requester.is_empty() && list_mask.has(Permissions::WRITE_TASK)
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Self) -> Self {
        Permissions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Permissions;

    fn bitand(self, rhs: Self) -> Self {
        Permissions(self.0 & rhs.0)
    }
}

impl Not for Permissions {
    type Output = Permissions;

    fn not(self) -> Self {
        Permissions(!self.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Permissions, &str); 6] = [
            (Permissions::READ_TASK, "read"),
            (Permissions::WRITE_TASK, "write"),
            (Permissions::PUBLIC_LIST, "public"),
            (Permissions::CREATE_LIST, "create-list"),
            (Permissions::DELETE_LIST, "delete-list"),
            (Permissions::DELETE_ACCOUNT, "delete-account"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.has(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}
