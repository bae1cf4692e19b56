//! GoTrue (Supabase Auth) identity provider client.

use async_trait::async_trait;
use chrono::Utc;
use clan_common::{Session, SessionEvent, SessionEventKind, SessionUser};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};

use super::provider::{IdentityProvider, SessionChannel, SessionSubscription};
use crate::error::{Error, Result};

/// Identity provider backed by a GoTrue server.
///
/// Holds the session in memory and announces every change through its
/// [`SessionChannel`]. The OAuth handshake itself happens in the browser;
/// this client only builds the authorization URL and consumes the tokens the
/// redirect hands back.
pub struct GoTrueProvider {
    http_client: Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<Session>>,
    seed_refresh_token: Mutex<Option<String>>,
    events: SessionChannel,
}

/// Error body shapes GoTrue uses across versions.
#[derive(Debug, Default, Deserialize)]
struct GoTrueErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GoTrueProvider {
    /// `project_url` is the hosted project root; the auth API lives under `/auth/v1`.
    pub fn new(project_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            session: RwLock::new(None),
            seed_refresh_token: Mutex::new(None),
            events: SessionChannel::new(),
        }
    }

    /// Restore a session from a refresh token on the next session query.
    pub fn with_refresh_token(self, refresh_token: Option<String>) -> Self {
        Self {
            seed_refresh_token: Mutex::new(refresh_token.filter(|t| !t.trim().is_empty())),
            ..self
        }
    }

    /// Adopt the tokens handed back by the OAuth redirect.
    ///
    /// Looks up the user behind the access token and announces `SignedIn`.
    pub async fn complete_sign_in(
        &self,
        access_token: &str,
        refresh_token: Option<String>,
        expires_at: Option<i64>,
    ) -> Result<Session> {
        let url = format!("{}/user", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let user: SessionUser = response
            .json()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token,
            expires_at,
            user,
        };
        self.replace_session(SessionEventKind::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    async fn refresh(&self, refresh_token: &str, kind: SessionEventKind) -> Result<Session> {
        let url = format!("{}/token?grant_type=refresh_token", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let session: Session = response
            .json()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        tracing::debug!(user_id = %session.user_id(), "Refreshed session");
        self.replace_session(kind, Some(session.clone())).await;
        Ok(session)
    }

    async fn replace_session(&self, kind: SessionEventKind, session: Option<Session>) {
        *self.session.write().await = session.clone();
        self.events.emit(SessionEvent::new(kind, session));
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn current_session(&self) -> Result<Option<Session>> {
        let cached = self.session.read().await.clone();

        match cached {
            Some(session) if !session.is_expired(Utc::now()) => Ok(Some(session)),
            Some(session) => match session.refresh_token {
                Some(token) => self
                    .refresh(&token, SessionEventKind::TokenRefreshed)
                    .await
                    .map(Some),
                None => {
                    self.replace_session(SessionEventKind::SignedOut, None).await;
                    Ok(None)
                }
            },
            None => {
                let seed = self.seed_refresh_token.lock().await.take();
                match seed {
                    Some(token) => self
                        .refresh(&token, SessionEventKind::InitialSession)
                        .await
                        .map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    async fn sign_in_with_provider(&self, provider: &str, redirect_to: &str) -> Result<Url> {
        if provider.trim().is_empty() {
            return Err(Error::Provider("Unsupported provider: provider name is empty".to_string()));
        }

        Url::parse_with_params(
            &format!("{}/authorize", self.base_url),
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .map_err(|e| Error::Provider(e.to_string()))
    }

    async fn sign_out(&self) -> Result<()> {
        let session = self.session.read().await.clone();

        if let Some(session) = session {
            let url = format!("{}/logout", self.base_url);
            let response = self
                .http_client
                .post(&url)
                .header("apikey", &self.api_key)
                .bearer_auth(&session.access_token)
                .send()
                .await
                .map_err(|e| Error::Provider(e.to_string()))?;

            let status = response.status();
            // 401/404: the server already forgot this session.
            if !status.is_success() && status.as_u16() != 401 && status.as_u16() != 404 {
                return Err(provider_error(response).await);
            }
        }

        self.replace_session(SessionEventKind::SignedOut, None).await;
        Ok(())
    }

    fn on_session_change(&self) -> SessionSubscription {
        self.events.subscribe()
    }
}

async fn provider_error(response: Response) -> Error {
    let status = response.status();
    let body: GoTrueErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .error_description
        .or(body.msg)
        .or(body.message)
        .or(body.error)
        .unwrap_or_else(|| format!("GoTrue returned {}", status));
    Error::Provider(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authorize_url() {
        let provider = GoTrueProvider::new("https://x.supabase.co/", "anon");
        let url = provider
            .sign_in_with_provider("discord", "http://localhost:5173/")
            .await
            .unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".to_string(), "discord".to_string())));
        assert!(pairs.contains(&("redirect_to".to_string(), "http://localhost:5173/".to_string())));
    }

    #[tokio::test]
    async fn test_empty_provider_rejected() {
        let provider = GoTrueProvider::new("https://x.supabase.co", "anon");
        let result = provider.sign_in_with_provider(" ", "http://localhost/").await;
        assert!(matches!(result, Err(Error::Provider(_))));
    }

    #[tokio::test]
    async fn test_no_session_without_seed() {
        let provider = GoTrueProvider::new("https://x.supabase.co", "anon")
            .with_refresh_token(Some("  ".to_string()));
        assert_eq!(provider.current_session().await.unwrap(), None);
    }
}
