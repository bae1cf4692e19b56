//! Cached profile of the signed-in user.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use clan_common::{Profile, Session};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::cooldown::RefreshCooldown;
use crate::auth::AuthState;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::store::DataStore;

/// Avatar shown when the profile carries none.
pub const PLACEHOLDER_AVATAR_URL: &str = "/temp_avatar.png";

/// Display name when there is neither a profile nor a session.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Snapshot of the profile cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileState {
    pub profile: Option<Profile>,
    pub is_loading: bool,
}

impl ProfileState {
    fn absent() -> Self {
        Self {
            profile: None,
            is_loading: false,
        }
    }
}

/// Derives the authorized user's profile from the current session.
///
/// Follows the session manager's state: every new identity triggers a
/// background synchronization followed by a reload. Results that arrive
/// after the session has moved on are dropped.
pub struct ProfileStore {
    sessions: watch::Receiver<AuthState>,
    store: Arc<dyn DataStore>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<ProfileState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ProfileStore {
    pub fn new(
        sessions: watch::Receiver<AuthState>,
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(ProfileState {
            profile: None,
            is_loading: true,
        });
        Self {
            sessions,
            store,
            notifier,
            state,
            listener: Mutex::new(None),
        }
    }

    /// Follow session changes until [`ProfileStore::shutdown`].
    ///
    /// Token refreshes for the same user do not trigger a new sync.
    pub fn start(self: &Arc<Self>) {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            return;
        }

        let this = Arc::downgrade(self);
        let mut sessions = self.sessions.clone();
        *listener = Some(tokio::spawn(async move {
            let mut handled: Option<Option<Uuid>> = None;
            loop {
                let auth = sessions.borrow_and_update().clone();
                let Some(store) = this.upgrade() else { break };

                if !auth.is_authenticating {
                    let user = auth.session.as_ref().map(Session::user_id);
                    if handled != Some(user) {
                        handled = Some(user);
                        store.on_auth_change(&auth).await;
                    }
                }
                drop(store);

                if sessions.changed().await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Apply one authentication state.
    ///
    /// Synchronization failures here are background failures: logged, then
    /// the last persisted profile is read instead.
    pub async fn on_auth_change(&self, auth: &AuthState) {
        if auth.is_authenticating {
            return;
        }

        let Some(session) = &auth.session else {
            self.state.send_replace(ProfileState::absent());
            return;
        };

        let user_id = session.user_id();
        self.state.send_modify(|s| {
            if s.profile.as_ref().is_some_and(|p| p.id != user_id) {
                s.profile = None;
            }
            s.is_loading = true;
        });

        if let Err(e) = self.store.sync_profile_from_auth(session, false).await {
            tracing::warn!(user_id = %session.user_id(), "Profile sync failed, using cached profile: {}", e);
        }
        // Errors are already reported by the reload itself.
        let _ = self.reload_profile().await;
    }

    /// Fetch the own profile row for the current session.
    ///
    /// A missing row resolves to no profile without an error.
    pub async fn reload_profile(&self) -> Result<Option<Profile>> {
        let Some(session) = self.current_session() else {
            self.state.send_replace(ProfileState::absent());
            return Ok(None);
        };

        let result = self.store.fetch_own_profile(&session).await;

        if !self.is_current(&session) {
            tracing::debug!(user_id = %session.user_id(), "Discarding profile for a stale session");
            return Ok(None);
        }

        match result {
            Ok(profile) => {
                tracing::debug!(user_id = %profile.id, permission = %profile.permission, "Profile loaded");
                self.state.send_replace(ProfileState {
                    profile: Some(profile.clone()),
                    is_loading: false,
                });
                Ok(Some(profile))
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(user_id = %session.user_id(), "No profile row yet");
                self.state.send_replace(ProfileState::absent());
                Ok(None)
            }
            Err(e) => {
                self.state.send_replace(ProfileState::absent());
                self.notifier.notify(&e);
                Err(e)
            }
        }
    }

    /// Run `sync_profile_from_auth(force)` for the current user, then reload.
    ///
    /// No-op without a session. Sync failures are reported and returned.
    pub async fn refresh_profile_from_authentication(&self, force: bool) -> Result<()> {
        let Some(session) = self.current_session() else {
            tracing::debug!("Skipping profile refresh without a session");
            return Ok(());
        };

        if let Err(e) = self.store.sync_profile_from_auth(&session, force).await {
            self.notifier.notify(&e);
            return Err(e);
        }

        self.reload_profile().await.map(|_| ())
    }

    /// Manual avatar refresh.
    ///
    /// Refuses with [`Error::CoolingDown`] while the cooldown is active,
    /// without contacting the data store.
    pub async fn refresh_avatar(&self, now: DateTime<Utc>) -> Result<()> {
        let cooldown = self.cooldown();
        if !cooldown.can_refresh_now(now) {
            return Err(Error::CoolingDown(cooldown.label(now)));
        }

        self.refresh_profile_from_authentication(true).await
    }

    /// Store a trimmed display name override; blank clears it.
    pub async fn save_display_name_override(&self, value: &str) -> Result<()> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };

        let value = value.trim();
        let value = (!value.is_empty()).then_some(value);

        if let Err(e) = self
            .store
            .update_display_name_override(&session, session.user_id(), value)
            .await
        {
            self.notifier.notify(&e);
            return Err(e);
        }

        self.reload_profile().await.map(|_| ())
    }

    pub fn cooldown(&self) -> RefreshCooldown {
        let profile = self.own_profile();
        RefreshCooldown::new(profile.as_ref().and_then(|p| p.next_manual_refresh_at.as_deref()))
    }

    pub fn display_name(&self) -> String {
        let session = self.current_session();
        resolve_display_name(self.own_profile().as_ref(), session.as_ref())
    }

    pub fn avatar_url(&self) -> String {
        resolve_avatar_url(self.own_profile().as_ref())
    }

    /// The loaded profile of the user signed in right now.
    ///
    /// `None` while loading or while the cache still holds another user's row.
    /// Permission decisions read this, never [`ProfileStore::profile`].
    pub fn acting_profile(&self) -> Option<Profile> {
        if self.state.borrow().is_loading {
            return None;
        }
        self.own_profile()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn snapshot(&self) -> ProfileState {
        self.state.borrow().clone()
    }

    /// Snapshot for the signed-in user; another user's cached row reads as
    /// still loading.
    pub fn current_state(&self) -> ProfileState {
        let state = self.snapshot();
        let user_id = self.current_session().map(|s| s.user_id());
        match (&state.profile, user_id) {
            (Some(profile), Some(user_id)) if profile.id != user_id => ProfileState {
                profile: None,
                is_loading: true,
            },
            _ => state,
        }
    }

    pub fn watch(&self) -> watch::Receiver<ProfileState> {
        self.state.subscribe()
    }

    /// Resolve once the profile is no longer loading.
    pub async fn wait_until_loaded(&self) -> ProfileState {
        let mut rx = self.state.subscribe();
        let loaded = rx.wait_for(|state| !state.is_loading).await.map(|s| s.clone());
        loaded.unwrap_or_else(|_| self.snapshot())
    }

    pub fn shutdown(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn own_profile(&self) -> Option<Profile> {
        let user_id = self.current_session()?.user_id();
        self.state
            .borrow()
            .profile
            .clone()
            .filter(|p| p.id == user_id)
    }

    fn current_session(&self) -> Option<Session> {
        self.sessions.borrow().session.clone()
    }

    fn is_current(&self, session: &Session) -> bool {
        self.sessions
            .borrow()
            .session
            .as_ref()
            .is_some_and(|current| current.same_identity(session))
    }
}

impl Drop for ProfileStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Override, then provider display name, then email, then user id.
pub fn resolve_display_name(profile: Option<&Profile>, session: Option<&Session>) -> String {
    if let Some(name) = profile.and_then(|p| p.effective_override().or(p.effective_display_name())) {
        return name.to_string();
    }

    match session {
        Some(session) => session
            .email()
            .map(str::to_string)
            .unwrap_or_else(|| session.user_id().to_string()),
        None => UNKNOWN_USER.to_string(),
    }
}

pub fn resolve_avatar_url(profile: Option<&Profile>) -> String {
    profile
        .and_then(Profile::effective_avatar_url)
        .unwrap_or(PLACEHOLDER_AVATAR_URL)
        .to_string()
}
