//! Permission tiers for clan console users.

use serde::{Deserialize, Serialize};

/// Permission tier assigned to a profile.
///
/// Tiers are ordered: `Locked < Manager < Administrator < Owner`. Every
/// freshly synchronized profile starts out `Locked` until an owner promotes it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Signed in but awaiting approval.
    #[default]
    Locked,
    /// May manage recruits.
    Manager,
    /// May manage recruits and ranks.
    Administrator,
    /// Full control, including permission changes.
    Owner,
}

impl Permission {
    /// All permission variants, lowest tier first.
    pub const ALL: [Permission; 4] = [
        Permission::Locked,
        Permission::Manager,
        Permission::Administrator,
        Permission::Owner,
    ];

    /// Wire name as stored by the data store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Locked => "locked",
            Permission::Manager => "manager",
            Permission::Administrator => "administrator",
            Permission::Owner => "owner",
        }
    }

    /// Human-readable label for selection menus.
    pub fn label(&self) -> &'static str {
        match self {
            Permission::Locked => "Locked",
            Permission::Manager => "Manager",
            Permission::Administrator => "Administrator",
            Permission::Owner => "Owner",
        }
    }

    /// Whether the holder has been approved by an owner.
    pub fn is_approved(&self) -> bool {
        !matches!(self, Permission::Locked)
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Permission::Owner)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl std::str::FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}
