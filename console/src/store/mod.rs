//! Hosted data store abstraction.
//!
//! Every call runs under the caller's session, so row-level security on the
//! server decides what "own profile" means and which procedures are
//! privileged.

mod postgrest;

pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use clan_common::{Permission, Profile, ProfileSummary, Recruit, Session};
use uuid::Uuid;

use crate::error::Result;

/// Row storage and remote procedures consumed by the console.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Select the single profile row visible to the session's user.
    ///
    /// Returns [`crate::Error::NotFound`] when the user has never been synchronized.
    async fn fetch_own_profile(&self, session: &Session) -> Result<Profile>;

    /// Set or clear (`None`) the user's display name override.
    async fn update_display_name_override(
        &self,
        session: &Session,
        user_id: Uuid,
        value: Option<&str>,
    ) -> Result<()>;

    /// `sync_profile_from_auth(force)`: copy provider claims into the profile.
    /// A forced call is a rate-limited manual refresh.
    async fn sync_profile_from_auth(&self, session: &Session, force: bool) -> Result<()>;

    /// `set_user_permission(target_user_id, new_permission)`; owner only.
    async fn set_user_permission(
        &self,
        session: &Session,
        target_user_id: Uuid,
        permission: Permission,
    ) -> Result<()>;

    /// `list_profiles_for_owner()`; owner only.
    async fn list_profiles_for_owner(&self, session: &Session) -> Result<Vec<ProfileSummary>>;

    /// Recruit rows, newest first.
    async fn list_recruits(&self, session: &Session) -> Result<Vec<Recruit>>;
}
