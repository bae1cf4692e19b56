//! Identity-provider session types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// User attached to an authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Unique user identifier issued by the identity provider.
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider-supplied claims (Discord name, avatar, ...).
    #[serde(default)]
    pub user_metadata: Value,
}

/// Token bundle issued by the identity provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as a unix timestamp in seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// Email address, if the provider supplied a non-empty one.
    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref().filter(|e| !e.is_empty())
    }

    /// Whether both sessions belong to the same user.
    pub fn same_identity(&self, other: &Session) -> bool {
        self.user.id == other.user.id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|exp| exp <= now.timestamp())
            .unwrap_or(false)
    }

    /// Best-effort display name from provider claims.
    ///
    /// Falls back to the email and finally the user identifier.
    pub fn claimed_name(&self) -> String {
        let meta = &self.user.user_metadata;
        let global_name = meta
            .get("custom_claims")
            .and_then(|claims| non_empty_str(claims, "global_name"));

        global_name
            .or_else(|| non_empty_str(meta, "full_name"))
            .or_else(|| non_empty_str(meta, "name"))
            .or_else(|| non_empty_str(meta, "preferred_username"))
            .or_else(|| non_empty_str(meta, "user_name"))
            .or_else(|| non_empty_str(meta, "username"))
            .or_else(|| self.email())
            .map(str::to_string)
            .unwrap_or_else(|| self.user.id.to_string())
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user.id)
            .field("email", &self.user.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// Kind of session change announced by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// A session change notification. `session` is `None` once signed out.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    pub fn signed_out() -> Self {
        Self::new(SessionEventKind::SignedOut, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_with(email: Option<&str>, metadata: Value) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: Uuid::nil(),
                email: email.map(String::from),
                user_metadata: metadata,
            },
        }
    }

    #[test]
    fn test_claimed_name_prefers_global_name() {
        let session = session_with(
            Some("a@b.com"),
            json!({
                "custom_claims": { "global_name": "Bobby" },
                "full_name": "bob#1234",
                "name": "bob"
            }),
        );
        assert_eq!(session.claimed_name(), "Bobby");
    }

    #[test]
    fn test_claimed_name_walks_fallbacks() {
        let session = session_with(Some("a@b.com"), json!({ "preferred_username": "bobcat" }));
        assert_eq!(session.claimed_name(), "bobcat");

        let session = session_with(Some("a@b.com"), json!({ "name": "" }));
        assert_eq!(session.claimed_name(), "a@b.com");

        let session = session_with(None, Value::Null);
        assert_eq!(session.claimed_name(), Uuid::nil().to_string());
    }

    #[test]
    fn test_empty_email_is_absent() {
        let session = session_with(Some(""), Value::Null);
        assert_eq!(session.email(), None);
    }

    #[test]
    fn test_debug_hides_tokens() {
        let session = session_with(Some("a@b.com"), Value::Null);
        let debug = format!("{:?}", session);
        assert!(debug.contains("a@b.com"));
        assert!(!debug.contains("token"));
    }

    #[test]
    fn test_is_expired() {
        let mut session = session_with(None, Value::Null);
        let now = Utc::now();
        assert!(!session.is_expired(now));

        session.expires_at = Some(now.timestamp() - 10);
        assert!(session.is_expired(now));

        session.expires_at = Some(now.timestamp() + 3600);
        assert!(!session.is_expired(now));
    }

    #[test]
    fn test_deserialize_gotrue_session() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1700000000,
            "refresh_token": "refresh",
            "user": {
                "id": "6f1c2d8e-2b4a-4c55-9d0e-1a2b3c4d5e6f",
                "email": "a@b.com",
                "user_metadata": { "full_name": "Bob" },
                "app_metadata": { "provider": "discord" }
            }
        }))
        .unwrap();

        assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(session.expires_at, Some(1700000000));
        assert_eq!(session.claimed_name(), "Bob");
    }
}
