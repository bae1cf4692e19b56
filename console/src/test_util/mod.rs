//! Scripted collaborators for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use clan_common::{Permission, Profile, ProfileSummary, Recruit, Session, SessionEvent, SessionUser};
use reqwest::Url;
use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::auth::{IdentityProvider, SessionChannel, SessionSubscription};
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::store::DataStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn test_session(user_id: Uuid, email: Option<&str>) -> Session {
    Session {
        access_token: format!("access-{}", user_id),
        refresh_token: Some(format!("refresh-{}", user_id)),
        expires_at: Some((Utc::now() + Duration::hours(1)).timestamp()),
        user: SessionUser {
            id: user_id,
            email: email.map(str::to_string),
            user_metadata: json!({}),
        },
    }
}

pub fn test_profile(user_id: Uuid, permission: Permission) -> Profile {
    let now = Utc::now();
    let short = user_id.simple().to_string()[..8].to_string();
    Profile {
        id: user_id,
        permission,
        display_name: Some(format!("User {}", short)),
        user_name: Some(format!("user_{}", short)),
        avatar_url: None,
        provider: "discord".to_string(),
        provider_user_id: Some(short),
        display_name_override: None,
        last_synced_at: Some(now),
        next_manual_refresh_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_recruit(rs_name: &str, created_at: DateTime<Utc>) -> Recruit {
    Recruit {
        id: Uuid::new_v4(),
        rs_name: rs_name.to_string(),
        discord_name: None,
        status: "pending".to_string(),
        notes: None,
        created_by: Uuid::new_v4(),
        created_at,
        updated_at: created_at,
        deleted_at: None,
    }
}

/// Notifier that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, error: &Error) {
        lock(&self.messages).push(error.to_string());
    }
}

struct ProviderScript {
    current: Option<Session>,
    current_error: Option<Error>,
    current_hold: Option<Arc<Notify>>,
    sign_in_error: Option<Error>,
    sign_in_calls: Vec<(String, String)>,
    confirm_sign_out: bool,
    sign_out_error: Option<Error>,
}

/// Identity provider driven by the test.
pub struct FakeIdentityProvider {
    script: Mutex<ProviderScript>,
    events: SessionChannel,
    subscriptions: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(ProviderScript {
                current: None,
                current_error: None,
                current_hold: None,
                sign_in_error: None,
                sign_in_calls: Vec::new(),
                confirm_sign_out: true,
                sign_out_error: None,
            }),
            events: SessionChannel::new(),
            subscriptions: AtomicUsize::new(0),
        }
    }

    pub fn set_current_session(&self, session: Option<Session>) {
        lock(&self.script).current = session;
    }

    pub fn fail_current_session(&self, error: Error) {
        lock(&self.script).current_error = Some(error);
    }

    /// Block session queries until the returned handle is notified.
    pub fn hold_current_session(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        lock(&self.script).current_hold = Some(release.clone());
        release
    }

    pub fn fail_sign_in(&self, error: Error) {
        lock(&self.script).sign_in_error = Some(error);
    }

    pub fn sign_in_calls(&self) -> Vec<(String, String)> {
        lock(&self.script).sign_in_calls.clone()
    }

    /// Whether a successful sign-out emits `SignedOut`.
    pub fn set_confirm_sign_out(&self, confirm: bool) {
        lock(&self.script).confirm_sign_out = confirm;
    }

    pub fn fail_sign_out(&self, error: Error) {
        lock(&self.script).sign_out_error = Some(error);
    }

    pub fn emit(&self, event: SessionEvent) {
        lock(&self.script).current = event.session.clone();
        self.events.emit(event);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl Default for FakeIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>> {
        let hold = lock(&self.script).current_hold.take();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        let script = lock(&self.script);
        match &script.current_error {
            Some(e) => Err(e.clone()),
            None => Ok(script.current.clone()),
        }
    }

    async fn sign_in_with_provider(&self, provider: &str, redirect_to: &str) -> Result<Url> {
        let mut script = lock(&self.script);
        script
            .sign_in_calls
            .push((provider.to_string(), redirect_to.to_string()));
        if let Some(e) = &script.sign_in_error {
            return Err(e.clone());
        }
        Url::parse_with_params("https://idp.test/authorize", &[("provider", provider)])
            .map_err(|e| Error::Provider(e.to_string()))
    }

    async fn sign_out(&self) -> Result<()> {
        let confirm = {
            let script = lock(&self.script);
            if let Some(e) = &script.sign_out_error {
                return Err(e.clone());
            }
            script.confirm_sign_out
        };
        if confirm {
            self.emit(SessionEvent::signed_out());
        }
        Ok(())
    }

    fn on_session_change(&self) -> SessionSubscription {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.events.subscribe()
    }
}

#[derive(Default)]
struct StoreScript {
    profiles: HashMap<Uuid, Profile>,
    recruits: Vec<Recruit>,
    sync_calls: Vec<(Uuid, bool)>,
    permission_calls: Vec<(Uuid, Permission)>,
    list_calls: usize,
    fetch_calls: usize,
    list_hold: Option<Arc<Notify>>,
    fetch_error: Option<Error>,
    fetch_hold: Option<Arc<Notify>>,
    sync_error: Option<Error>,
    update_error: Option<Error>,
    list_error: Option<Error>,
    set_permission_error: Option<Error>,
    recruits_error: Option<Error>,
}

/// In-memory data store with the server's row-level rules.
///
/// The first sync creates a `locked` profile; a forced sync starts a five
/// minute cooldown; privileged calls require an `owner` caller.
#[derive(Default)]
pub struct FakeDataStore {
    script: Mutex<StoreScript>,
}

impl FakeDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        lock(&self.script).profiles.insert(profile.id, profile);
    }

    pub fn profile(&self, user_id: Uuid) -> Option<Profile> {
        lock(&self.script).profiles.get(&user_id).cloned()
    }

    pub fn insert_recruit(&self, recruit: Recruit) {
        lock(&self.script).recruits.push(recruit);
    }

    pub fn fail_fetch(&self, error: Error) {
        lock(&self.script).fetch_error = Some(error);
    }

    /// Block the next profile fetch until the returned handle is notified.
    pub fn hold_fetch(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        lock(&self.script).fetch_hold = Some(release.clone());
        release
    }

    pub fn fail_sync(&self, error: Error) {
        lock(&self.script).sync_error = Some(error);
    }

    pub fn fail_update(&self, error: Error) {
        lock(&self.script).update_error = Some(error);
    }

    /// Block the next owner listing until the returned handle is notified.
    pub fn hold_list(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        lock(&self.script).list_hold = Some(release.clone());
        release
    }

    pub fn fail_list(&self, error: Error) {
        lock(&self.script).list_error = Some(error);
    }

    pub fn fail_set_permission(&self, error: Error) {
        lock(&self.script).set_permission_error = Some(error);
    }

    pub fn fail_recruits(&self, error: Error) {
        lock(&self.script).recruits_error = Some(error);
    }

    pub fn sync_calls(&self) -> Vec<(Uuid, bool)> {
        lock(&self.script).sync_calls.clone()
    }

    pub fn permission_calls(&self) -> Vec<(Uuid, Permission)> {
        lock(&self.script).permission_calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        lock(&self.script).list_calls
    }

    pub fn fetch_calls(&self) -> usize {
        lock(&self.script).fetch_calls
    }
}

fn require_owner(script: &StoreScript, session: &Session, function: &str) -> Result<()> {
    let is_owner = script
        .profiles
        .get(&session.user_id())
        .is_some_and(|p| p.permission.is_owner());
    if is_owner {
        Ok(())
    } else {
        Err(Error::Privilege(format!("permission denied for function {}", function)))
    }
}

#[async_trait]
impl DataStore for FakeDataStore {
    async fn fetch_own_profile(&self, session: &Session) -> Result<Profile> {
        let hold = {
            let mut script = lock(&self.script);
            script.fetch_calls += 1;
            script.fetch_hold.take()
        };
        if let Some(hold) = hold {
            hold.notified().await;
        }

        let script = lock(&self.script);
        if let Some(e) = &script.fetch_error {
            return Err(e.clone());
        }
        script
            .profiles
            .get(&session.user_id())
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn update_display_name_override(
        &self,
        _session: &Session,
        user_id: Uuid,
        value: Option<&str>,
    ) -> Result<()> {
        let mut script = lock(&self.script);
        if let Some(e) = &script.update_error {
            return Err(e.clone());
        }
        if let Some(profile) = script.profiles.get_mut(&user_id) {
            profile.display_name_override = value.map(str::to_string);
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn sync_profile_from_auth(&self, session: &Session, force: bool) -> Result<()> {
        let mut script = lock(&self.script);
        let user_id = session.user_id();
        script.sync_calls.push((user_id, force));
        if let Some(e) = &script.sync_error {
            return Err(e.clone());
        }

        let now = Utc::now();
        let profile = script.profiles.entry(user_id).or_insert_with(|| {
            let mut profile = test_profile(user_id, Permission::Locked);
            profile.display_name = Some(session.claimed_name());
            profile
        });
        profile.last_synced_at = Some(now);
        profile.updated_at = now;
        if force {
            profile.next_manual_refresh_at = Some((now + Duration::minutes(5)).to_rfc3339());
        }
        Ok(())
    }

    async fn set_user_permission(
        &self,
        session: &Session,
        target_user_id: Uuid,
        permission: Permission,
    ) -> Result<()> {
        let mut script = lock(&self.script);
        script.permission_calls.push((target_user_id, permission));
        if let Some(e) = &script.set_permission_error {
            return Err(e.clone());
        }
        require_owner(&script, session, "set_user_permission")?;

        if let Some(profile) = script.profiles.get_mut(&target_user_id) {
            profile.permission = permission;
        }
        Ok(())
    }

    async fn list_profiles_for_owner(&self, session: &Session) -> Result<Vec<ProfileSummary>> {
        let hold = {
            let mut script = lock(&self.script);
            script.list_calls += 1;
            script.list_hold.take()
        };
        if let Some(hold) = hold {
            hold.notified().await;
        }

        let script = lock(&self.script);
        if let Some(e) = &script.list_error {
            return Err(e.clone());
        }
        require_owner(&script, session, "list_profiles_for_owner")?;

        let mut rows: Vec<ProfileSummary> = script
            .profiles
            .values()
            .map(|p| ProfileSummary {
                id: p.id,
                display_name: p.display_name.clone(),
                user_name: p.user_name.clone(),
                avatar_url: p.avatar_url.clone(),
                permission: p.permission,
                last_synced_at: p.last_synced_at,
                created_at: p.created_at,
            })
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        Ok(rows)
    }

    async fn list_recruits(&self, _session: &Session) -> Result<Vec<Recruit>> {
        let script = lock(&self.script);
        if let Some(e) = &script.recruits_error {
            return Err(e.clone());
        }
        let mut recruits = script.recruits.clone();
        recruits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recruits)
    }
}
