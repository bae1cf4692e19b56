//! Identity provider abstraction.

use async_trait::async_trait;
use clan_common::{Session, SessionEvent};
use reqwest::Url;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::Result;

/// Hosted identity provider consumed by the console.
///
/// The provider owns the OAuth handshake and token issuance; the console only
/// asks for the current session, starts sign-in, requests sign-out and
/// listens for change notifications.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Query the session the provider currently holds, if any.
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Begin sign-in with an OAuth provider.
    ///
    /// Returns the authorization URL the user has to visit. The resulting
    /// session arrives through [`IdentityProvider::on_session_change`].
    async fn sign_in_with_provider(&self, provider: &str, redirect_to: &str) -> Result<Url>;

    /// Request sign-out. Confirmation arrives as a `SignedOut` notification.
    async fn sign_out(&self) -> Result<()>;

    /// Subscribe to session change notifications. Dropping the subscription
    /// unsubscribes.
    fn on_session_change(&self) -> SessionSubscription;
}

/// Fan-out channel for session change notifications.
#[derive(Debug, Clone)]
pub struct SessionChannel {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Deliver an event to every live subscription.
    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; the event is simply dropped.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to session change notifications.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Wait for the next notification, in provider order.
    ///
    /// Returns `None` once the provider has gone away.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Session subscription lagged, skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clan_common::SessionEventKind;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let channel = SessionChannel::new();
        let mut sub = channel.subscribe();

        channel.emit(SessionEvent::new(SessionEventKind::SignedIn, None));
        channel.emit(SessionEvent::signed_out());

        assert_eq!(sub.next().await.unwrap().kind, SessionEventKind::SignedIn);
        assert_eq!(sub.next().await.unwrap().kind, SessionEventKind::SignedOut);
    }

    #[tokio::test]
    async fn test_subscription_ends_when_channel_dropped() {
        let channel = SessionChannel::new();
        let mut sub = channel.subscribe();
        drop(channel);

        assert!(sub.next().await.is_none());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let channel = SessionChannel::new();
        channel.emit(SessionEvent::signed_out());
    }
}
