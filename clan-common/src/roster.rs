//! Roster rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column list for selecting recruit rows.
pub const RECRUIT_COLUMNS: &str =
    "id,rs_name,discord_name,status,notes,created_by,created_at,updated_at,deleted_at";

/// A tracked recruit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recruit {
    pub id: Uuid,
    /// In-game name.
    pub rs_name: String,
    #[serde(default)]
    pub discord_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Recruit {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
