//! Profile records synchronized from the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Permission;

/// Column list for selecting a full profile row.
pub const PROFILE_COLUMNS: &str = "id,permission,display_name,user_name,avatar_url,provider,\
provider_user_id,display_name_override,last_synced_at,next_manual_refresh_at,created_at,updated_at";

/// Durable profile row, keyed 1:1 by user identifier.
///
/// Created server-side on the first successful synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub permission: Permission,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub provider: String,
    #[serde(default)]
    pub provider_user_id: Option<String>,
    /// User-settable; takes priority over `display_name` when non-empty.
    #[serde(default)]
    pub display_name_override: Option<String>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Server-computed rate-limit gate. Kept raw: an unparseable value
    /// must not fail the whole row.
    #[serde(default)]
    pub next_manual_refresh_at: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Override if set to something other than whitespace.
    pub fn effective_override(&self) -> Option<&str> {
        non_blank(self.display_name_override.as_deref())
    }

    pub fn effective_display_name(&self) -> Option<&str> {
        non_blank(self.display_name.as_deref())
    }

    pub fn effective_avatar_url(&self) -> Option<&str> {
        non_blank(self.avatar_url.as_deref())
    }

    pub fn is_locked(&self) -> bool {
        !self.permission.is_approved()
    }
}

/// Row returned by the owner-only profile listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub permission: Permission,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ProfileSummary {
    /// Display name, then user name, then the raw identifier.
    pub fn display_label(&self) -> String {
        non_blank(self.display_name.as_deref())
            .or_else(|| non_blank(self.user_name.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
