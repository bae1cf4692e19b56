//! Session lifecycle.
//!
//! The [`SessionManager`] is the single owner of the authenticated session.
//! It restores the session once on start, then follows the identity
//! provider's change notifications for its whole lifetime. Every other
//! component reads snapshots through [`SessionManager::watch`].

use std::sync::{Arc, Mutex, PoisonError};

use clan_common::Session;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::provider::IdentityProvider;
use crate::config::AuthConfig;
use crate::notify::Notifier;

/// Snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub session: Option<Session>,
    /// True until the first session query resolves or a notification
    /// arrives. While set, "no session" means "unknown", not "signed out".
    pub is_authenticating: bool,
}

impl AuthState {
    fn initial() -> Self {
        Self {
            session: None,
            is_authenticating: true,
        }
    }

    fn resolved(session: Option<Session>) -> Self {
        Self {
            session,
            is_authenticating: false,
        }
    }
}

/// Owns the current session and its subscription to provider notifications.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    provider_name: String,
    redirect_to: String,
    state: Arc<watch::Sender<AuthState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
        auth: &AuthConfig,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        Self {
            provider,
            notifier,
            provider_name: auth.provider.clone(),
            redirect_to: auth.redirect_to.clone(),
            state: Arc::new(state),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to provider notifications and restore the current session.
    pub async fn start(&self) {
        self.listen();
        self.restore().await;
    }

    /// Subscribe to provider notifications. Subsequent calls are no-ops.
    ///
    /// Every notification replaces the cached session unconditionally and
    /// ends the initial-load phase.
    pub fn listen(&self) {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            return;
        }

        let mut subscription = self.provider.on_session_change();
        let state = Arc::clone(&self.state);
        *listener = Some(tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                tracing::debug!(kind = ?event.kind, "Session change notification");
                state.send_replace(AuthState::resolved(event.session));
            }
            tracing::debug!("Session notifications closed");
        }));
    }

    /// Query the provider for the session it already holds.
    ///
    /// The result is applied only while the initial-load phase is still
    /// open; a notification that arrived first takes precedence.
    pub async fn restore(&self) {
        let session = match self.provider.current_session().await {
            Ok(session) => session,
            Err(e) => {
                self.notifier.notify(&e);
                None
            }
        };

        let applied = self.state.send_if_modified(|current| {
            if !current.is_authenticating {
                return false;
            }
            *current = AuthState::resolved(session);
            true
        });

        if applied {
            match self.session() {
                Some(session) => tracing::info!(user_id = %session.user_id(), "Session restored"),
                None => tracing::info!("No session to restore"),
            }
        } else {
            tracing::debug!("Discarding restored session; a notification arrived first");
        }
    }

    /// Begin sign-in with the configured OAuth provider.
    ///
    /// Failures are reported and leave the session unchanged.
    pub async fn sign_in(&self) {
        match self
            .provider
            .sign_in_with_provider(&self.provider_name, &self.redirect_to)
            .await
        {
            Ok(url) => tracing::info!("Continue sign-in with {} at {}", self.provider_name, url),
            Err(e) => self.notifier.notify(&e),
        }
    }

    /// Request sign-out.
    ///
    /// The session is cleared only when the provider confirms through its
    /// change notification.
    pub async fn sign_out(&self) {
        match self.provider.sign_out().await {
            Ok(()) => tracing::info!("Sign-out requested"),
            Err(e) => self.notifier.notify(&e),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn is_authenticating(&self) -> bool {
        self.state.borrow().is_authenticating
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state replacement.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Resolve once the initial-load phase is over.
    pub async fn wait_until_ready(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let ready = rx.wait_for(|state| !state.is_authenticating).await.map(|s| s.clone());
        ready.unwrap_or_else(|_| self.snapshot())
    }

    /// Tear down the provider subscription.
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
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_util::{test_session, FakeIdentityProvider, RecordingNotifier};
    use clan_common::{SessionEvent, SessionEventKind};
    use uuid::Uuid;

    fn manager(
        provider: &Arc<FakeIdentityProvider>,
        notifier: &Arc<RecordingNotifier>,
    ) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            provider.clone(),
            notifier.clone(),
            &AuthConfig::default(),
        ))
    }

    async fn wait_for_user(manager: &SessionManager, user: Option<Uuid>) {
        let mut rx = manager.watch();
        rx.wait_for(|s| !s.is_authenticating && s.session.as_ref().map(|s| s.user_id()) == user)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_starts_authenticating() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);

        assert!(manager.is_authenticating());
        assert!(manager.session().is_none());
    }

    #[tokio::test]
    async fn test_restore_existing_session() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let session = test_session(Uuid::new_v4(), Some("a@b.com"));
        provider.set_current_session(Some(session.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);

        manager.start().await;

        assert!(!manager.is_authenticating());
        assert_eq!(manager.session(), Some(session));
    }

    #[tokio::test]
    async fn test_restore_failure_resolves_to_no_session() {
        let provider = Arc::new(FakeIdentityProvider::new());
        provider.fail_current_session(Error::Provider("network down".to_string()));
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);

        manager.start().await;

        assert!(!manager.is_authenticating());
        assert!(manager.session().is_none());
        assert_eq!(notifier.messages(), vec!["Identity provider error: network down"]);
    }

    #[tokio::test]
    async fn test_notification_replaces_session() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);
        manager.start().await;

        let user = Uuid::new_v4();
        provider.emit(SessionEvent::new(
            SessionEventKind::SignedIn,
            Some(test_session(user, None)),
        ));
        wait_for_user(&manager, Some(user)).await;

        provider.emit(SessionEvent::signed_out());
        wait_for_user(&manager, None).await;
    }

    #[tokio::test]
    async fn test_notification_overrides_slow_restore() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let stale = test_session(Uuid::new_v4(), None);
        provider.set_current_session(Some(stale));
        let release = provider.hold_current_session();
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);

        manager.listen();
        let restoring = tokio::spawn({
            let manager = manager.clone();
            async move { manager.restore().await }
        });

        let fresh = Uuid::new_v4();
        provider.emit(SessionEvent::new(
            SessionEventKind::SignedIn,
            Some(test_session(fresh, None)),
        ));
        wait_for_user(&manager, Some(fresh)).await;

        release.notify_one();
        restoring.await.unwrap();

        assert_eq!(manager.session().map(|s| s.user_id()), Some(fresh));
    }

    #[tokio::test]
    async fn test_sign_in_failure_is_reported() {
        let provider = Arc::new(FakeIdentityProvider::new());
        provider.fail_sign_in(Error::Provider("Unsupported provider".to_string()));
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);
        manager.start().await;

        manager.sign_in().await;

        assert!(manager.session().is_none());
        assert_eq!(notifier.messages(), vec!["Identity provider error: Unsupported provider"]);
        assert_eq!(provider.sign_in_calls(), vec![("discord".to_string(), "http://localhost:5173/".to_string())]);
    }

    #[tokio::test]
    async fn test_sign_out_waits_for_confirmation() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let session = test_session(Uuid::new_v4(), None);
        provider.set_current_session(Some(session.clone()));
        provider.set_confirm_sign_out(false);
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);
        manager.start().await;

        manager.sign_out().await;

        // Not cleared optimistically.
        assert_eq!(manager.session(), Some(session));

        provider.emit(SessionEvent::signed_out());
        wait_for_user(&manager, None).await;
    }

    #[tokio::test]
    async fn test_sign_out_failure_keeps_session() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let session = test_session(Uuid::new_v4(), None);
        provider.set_current_session(Some(session.clone()));
        provider.fail_sign_out(Error::Provider("logout failed".to_string()));
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);
        manager.start().await;

        manager.sign_out().await;

        assert_eq!(manager.session(), Some(session));
        assert_eq!(notifier.messages(), vec!["Identity provider error: logout failed"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_following_notifications() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);
        manager.start().await;

        manager.shutdown();
        tokio::task::yield_now().await;
        provider.emit(SessionEvent::new(
            SessionEventKind::SignedIn,
            Some(test_session(Uuid::new_v4(), None)),
        ));
        tokio::task::yield_now().await;

        assert!(manager.session().is_none());
    }

    #[tokio::test]
    async fn test_listen_subscribes_once() {
        let provider = Arc::new(FakeIdentityProvider::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = manager(&provider, &notifier);

        manager.listen();
        manager.listen();

        assert_eq!(provider.subscription_count(), 1);
    }
}
