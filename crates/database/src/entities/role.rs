//! Chat roles and the capabilities each one grants.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Normal,
}

/// Actions gated by a caller's role in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RenameChat,
    DeleteChat,
    ManageMembers,
    PromoteAdmin,
    ReadChat,
    PostMessage,
    DeleteMessage,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Normal => "normal",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 2,
            Role::Admin => 1,
            Role::Normal => 0,
        }
    }

    pub fn has_at_least(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Capability table.
    ///
    /// ```
    /// use parley_database::{Capability, Role};
    ///
    /// assert!(Role::Owner.can(Capability::DeleteChat));
    /// assert!(Role::Admin.can(Capability::ManageMembers));
    /// assert!(!Role::Admin.can(Capability::RenameChat));
    /// assert!(Role::Normal.can(Capability::PostMessage));
    /// ```
    pub fn can(&self, capability: Capability) -> bool {
        match capability {
            Capability::RenameChat | Capability::DeleteChat => matches!(self, Role::Owner),
            Capability::ManageMembers | Capability::PromoteAdmin => {
                matches!(self, Role::Owner | Role::Admin)
            }
            Capability::ReadChat | Capability::PostMessage | Capability::DeleteMessage => true,
        }
    }
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::RenameChat => "rename_chat",
            Capability::DeleteChat => "delete_chat",
            Capability::ManageMembers => "manage_members",
            Capability::PromoteAdmin => "promote_admin",
            Capability::ReadChat => "read_chat",
            Capability::PostMessage => "post_message",
            Capability::DeleteMessage => "delete_message",
        }
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role `{}`", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "normal" => Ok(Role::Normal),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
