//! Application instance: one of each component, wired explicitly.

use std::sync::Arc;

use crate::access::AccessGate;
use crate::admin::{AdminPanel, FilePreferenceStore, PreferenceStore};
use crate::auth::{GoTrueProvider, IdentityProvider, SessionManager};
use crate::config::{AuthConfig, Config};
use crate::notify::{Notifier, TracingNotifier};
use crate::profile::ProfileStore;
use crate::roster::Roster;
use crate::store::{DataStore, PostgrestStore};

pub struct Console {
    pub sessions: Arc<SessionManager>,
    pub profiles: Arc<ProfileStore>,
    pub gate: AccessGate,
    pub admin: AdminPanel,
    pub roster: Roster,
}

impl Console {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn Notifier>,
        preferences: Arc<dyn PreferenceStore>,
        auth: &AuthConfig,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(provider, notifier.clone(), auth));
        let profiles = Arc::new(ProfileStore::new(
            sessions.watch(),
            store.clone(),
            notifier.clone(),
        ));
        let gate = AccessGate::new(sessions.clone(), profiles.clone());
        let admin = AdminPanel::new(
            sessions.clone(),
            profiles.clone(),
            store.clone(),
            notifier,
            preferences,
        );
        let roster = Roster::new(sessions.clone(), store);

        Self {
            sessions,
            profiles,
            gate,
            admin,
            roster,
        }
    }

    /// Console backed by the hosted service named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let provider = GoTrueProvider::new(&config.supabase.url, &config.supabase.publishable_key)
            .with_refresh_token(config.auth.refresh_token.clone());
        let store = PostgrestStore::new(&config.supabase.url, &config.supabase.publishable_key);
        let preferences = FilePreferenceStore::new(&config.preferences.path);

        Self::new(
            Arc::new(provider),
            Arc::new(store),
            Arc::new(TracingNotifier),
            Arc::new(preferences),
            &config.auth,
        )
    }

    /// Start following profile changes, then restore the session.
    pub async fn start(&self) {
        self.profiles.start();
        self.sessions.start().await;
    }

    pub fn shutdown(&self) {
        self.profiles.shutdown();
        self.sessions.shutdown();
    }
}
