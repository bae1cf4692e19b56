//! Owner-only user administration.

use std::collections::HashSet;
use std::sync::Arc;

use clan_common::{Permission, ProfileSummary, Session};
use tokio::sync::watch;
use uuid::Uuid;

use super::preferences::PreferenceStore;
use crate::auth::SessionManager;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::profile::ProfileStore;
use crate::store::DataStore;

/// Preference key holding the last selected settings tab.
pub const SETTINGS_TAB_KEY: &str = "settings:selectedTab";

const SELF_CHANGE: &str = "You cannot change your own role here.";
const OWNER_DEMOTION: &str = "Owners cannot be demoted here.";
const NOT_LISTED: &str = "User is not in the loaded list";

/// Settings surface tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdminTab {
    #[default]
    User,
    Owner,
}

impl AdminTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminTab::User => "user",
            AdminTab::Owner => "owner",
        }
    }

    /// Parse a persisted value; anything unexpected is ignored.
    pub fn from_stored(value: &str) -> Option<AdminTab> {
        match value {
            "user" => Some(AdminTab::User),
            "owner" => Some(AdminTab::Owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminState {
    pub users: Vec<ProfileSummary>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Rows with a permission change in flight.
    pub pending: HashSet<Uuid>,
    pub tab: AdminTab,
}

/// A selectable entry of a row's permission menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOption {
    pub permission: Permission,
    pub label: &'static str,
    pub selectable: bool,
}

/// What a listed row allows the acting owner to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowControls {
    pub is_self: bool,
    pub busy: bool,
    pub disabled: bool,
    /// Reason shown under a locked-down row.
    pub note: Option<&'static str>,
    pub options: Vec<PermissionOption>,
}

/// Reject changes the panel never issues: the acting owner's own row and
/// any row that is already `owner`.
pub fn permission_change_guard(acting_user: Uuid, target: &ProfileSummary) -> Result<()> {
    if target.id == acting_user {
        return Err(Error::Forbidden(SELF_CHANGE.to_string()));
    }
    if target.permission == Permission::Owner {
        return Err(Error::Forbidden(OWNER_DEMOTION.to_string()));
    }
    Ok(())
}

/// Owner view over every profile.
pub struct AdminPanel {
    sessions: Arc<SessionManager>,
    profiles: Arc<ProfileStore>,
    store: Arc<dyn DataStore>,
    notifier: Arc<dyn Notifier>,
    preferences: Arc<dyn PreferenceStore>,
    state: watch::Sender<AdminState>,
}

impl AdminPanel {
    pub fn new(
        sessions: Arc<SessionManager>,
        profiles: Arc<ProfileStore>,
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn Notifier>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let (state, _) = watch::channel(AdminState::default());
        Self {
            sessions,
            profiles,
            store,
            notifier,
            preferences,
            state,
        }
    }

    /// True only while the signed-in user's loaded profile is `owner`.
    pub fn is_visible(&self) -> bool {
        self.profiles
            .acting_profile()
            .is_some_and(|p| p.permission.is_owner())
    }

    /// Restore the persisted tab once the profile has loaded.
    ///
    /// Non-owners always land on the user tab.
    pub async fn restore_tab(&self) -> AdminTab {
        if self.profiles.is_loading() {
            return self.tab();
        }

        let tab = if self.is_visible() {
            match self.preferences.get(SETTINGS_TAB_KEY) {
                Ok(stored) => stored.as_deref().and_then(AdminTab::from_stored).unwrap_or_default(),
                Err(e) => {
                    tracing::warn!("Failed to read saved settings tab: {}", e);
                    AdminTab::User
                }
            }
        } else {
            AdminTab::User
        };

        self.state.send_modify(|s| s.tab = tab);
        if tab == AdminTab::Owner {
            // Failures land in the error slot.
            let _ = self.load_admin_users().await;
        }
        tab
    }

    /// Switch tabs, persisting the choice for owners.
    pub async fn select_tab(&self, tab: AdminTab) -> Result<()> {
        if !self.is_visible() {
            self.state.send_modify(|s| s.tab = AdminTab::User);
            return Ok(());
        }

        self.state.send_modify(|s| s.tab = tab);
        if let Err(e) = self.preferences.set(SETTINGS_TAB_KEY, tab.as_str()) {
            tracing::warn!("Failed to save settings tab: {}", e);
        }

        match tab {
            AdminTab::Owner => self.load_admin_users().await,
            AdminTab::User => Ok(()),
        }
    }

    pub fn tab(&self) -> AdminTab {
        self.state.borrow().tab
    }

    /// Fetch every profile through the privileged listing.
    pub async fn load_admin_users(&self) -> Result<()> {
        let Some(session) = self.owner_session() else {
            tracing::debug!("Skipping admin listing for a non-owner");
            return Ok(());
        };

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = self.store.list_profiles_for_owner(&session).await;

        if !self.is_current(&session) {
            tracing::debug!("Discarding admin listing for a stale session");
            self.state.send_modify(|s| s.is_loading = false);
            return Ok(());
        }

        match result {
            Ok(users) => {
                tracing::debug!(count = users.len(), "Loaded admin user list");
                self.state.send_modify(|s| {
                    s.users = users;
                    s.is_loading = false;
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!("list_profiles_for_owner failed: {}", e);
                self.state.send_modify(|s| {
                    s.error = Some(e.to_string());
                    s.is_loading = false;
                });
                Err(e)
            }
        }
    }

    /// Change a listed user's permission, then reload the whole list.
    ///
    /// Local guards run before any request. The row stays busy until the
    /// reload finishes.
    pub async fn set_user_permission(&self, target: Uuid, permission: Permission) -> Result<()> {
        let Some(session) = self.owner_session() else {
            tracing::debug!("Ignoring permission change from a non-owner");
            return Ok(());
        };

        let row = self
            .state
            .borrow()
            .users
            .iter()
            .find(|u| u.id == target)
            .cloned();
        let row = row.ok_or_else(|| Error::Forbidden(NOT_LISTED.to_string()))?;
        permission_change_guard(session.user_id(), &row)?;

        let started = self.state.send_if_modified(|s| {
            let started = s.pending.insert(target);
            if started {
                s.error = None;
            }
            started
        });
        if !started {
            tracing::debug!(%target, "Permission change already in flight");
            return Ok(());
        }

        if let Err(e) = self.store.set_user_permission(&session, target, permission).await {
            tracing::error!(%target, "set_user_permission failed: {}", e);
            self.state.send_modify(|s| {
                s.error = Some(e.to_string());
                s.pending.remove(&target);
            });
            self.notifier.notify(&e);
            return Err(e);
        }

        tracing::info!(%target, %permission, "Permission changed");
        let reloaded = self.load_admin_users().await;
        self.state.send_modify(|s| {
            s.pending.remove(&target);
        });
        reloaded
    }

    /// Affordances for one listed row.
    pub fn row_controls(&self, row: &ProfileSummary) -> RowControls {
        let acting = self.sessions.session().map(|s| s.user_id());
        let busy = self.state.borrow().pending.contains(&row.id);

        let guard = match acting {
            Some(acting) => permission_change_guard(acting, row),
            None => Err(Error::Forbidden(NOT_LISTED.to_string())),
        };
        let note = match &guard {
            Err(Error::Forbidden(msg)) if msg == SELF_CHANGE => Some(SELF_CHANGE),
            Err(Error::Forbidden(msg)) if msg == OWNER_DEMOTION => Some(OWNER_DEMOTION),
            _ => None,
        };
        let disabled = busy || guard.is_err();

        RowControls {
            is_self: acting == Some(row.id),
            busy,
            disabled,
            note,
            options: Permission::ALL
                .into_iter()
                .map(|permission| PermissionOption {
                    permission,
                    label: permission.label(),
                    selectable: !disabled,
                })
                .collect(),
        }
    }

    pub fn snapshot(&self) -> AdminState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AdminState> {
        self.state.subscribe()
    }

    fn owner_session(&self) -> Option<Session> {
        if !self.is_visible() {
            return None;
        }
        self.sessions.session()
    }

    fn is_current(&self, session: &Session) -> bool {
        self.sessions
            .session()
            .is_some_and(|current| current.same_identity(session))
    }
}
