//! GoTrue adapter against a mock auth server.

use chrono::Utc;
use clan_common::SessionEventKind;
use clan_console::auth::{GoTrueProvider, IdentityProvider};
use clan_console::Error;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "anon-key";

fn session_body(user_id: Uuid, access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": Utc::now().timestamp() + 3600,
        "refresh_token": refresh_token,
        "user": {
            "id": user_id,
            "aud": "authenticated",
            "email": "bob@clan.gg",
            "user_metadata": { "full_name": "Bob", "custom_claims": { "global_name": "Bobby" } }
        }
    })
}

#[tokio::test]
async fn test_restore_from_refresh_token() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(header("apikey", API_KEY))
        .and(body_json(json!({ "refresh_token": "seed-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(user_id, "at-1", "rt-1")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoTrueProvider::new(&server.uri(), API_KEY)
        .with_refresh_token(Some("seed-token".to_string()));
    let mut events = provider.on_session_change();

    let session = provider.current_session().await.unwrap().unwrap();
    assert_eq!(session.user_id(), user_id);
    assert_eq!(session.access_token, "at-1");
    assert_eq!(session.claimed_name(), "Bobby");

    let event = events.next().await.unwrap();
    assert_eq!(event.kind, SessionEventKind::InitialSession);

    // Cached afterwards; the mock expects exactly one refresh.
    let again = provider.current_session().await.unwrap().unwrap();
    assert_eq!(again.access_token, "at-1");
}

#[tokio::test]
async fn test_expired_session_is_refreshed() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer at-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id,
            "email": "bob@clan.gg",
            "user_metadata": {}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(body_json(json!({ "refresh_token": "rt-old" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(user_id, "at-new", "rt-new")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoTrueProvider::new(&server.uri(), API_KEY);
    provider
        .complete_sign_in("at-old", Some("rt-old".to_string()), Some(Utc::now().timestamp() - 10))
        .await
        .unwrap();

    let mut events = provider.on_session_change();
    let session = provider.current_session().await.unwrap().unwrap();

    assert_eq!(session.access_token, "at-new");
    assert_eq!(events.next().await.unwrap().kind, SessionEventKind::TokenRefreshed);
}

#[tokio::test]
async fn test_complete_sign_in() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", API_KEY))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id,
            "email": "bob@clan.gg",
            "user_metadata": { "preferred_username": "bob" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoTrueProvider::new(&server.uri(), API_KEY);
    let mut events = provider.on_session_change();

    let session = provider
        .complete_sign_in("at-1", Some("rt-1".to_string()), None)
        .await
        .unwrap();

    assert_eq!(session.user_id(), user_id);
    assert_eq!(session.email(), Some("bob@clan.gg"));
    let event = events.next().await.unwrap();
    assert_eq!(event.kind, SessionEventKind::SignedIn);
    assert_eq!(event.session, Some(session.clone()));
    assert_eq!(provider.current_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_refresh_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Refresh Token Not Found"
        })))
        .mount(&server)
        .await;

    let provider = GoTrueProvider::new(&server.uri(), API_KEY)
        .with_refresh_token(Some("revoked".to_string()));

    let result = provider.current_session().await;

    assert_eq!(
        result,
        Err(Error::Provider("Invalid Refresh Token: Refresh Token Not Found".to_string()))
    );
}

#[tokio::test]
async fn test_sign_out_emits_signed_out() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": user_id })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoTrueProvider::new(&server.uri(), API_KEY);
    provider.complete_sign_in("at-1", None, None).await.unwrap();
    let mut events = provider.on_session_change();

    provider.sign_out().await.unwrap();

    let event = events.next().await.unwrap();
    assert_eq!(event.kind, SessionEventKind::SignedOut);
    assert!(event.session.is_none());
    assert_eq!(provider.current_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_sign_out_of_forgotten_session() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": user_id })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "invalid JWT" })))
        .mount(&server)
        .await;

    let provider = GoTrueProvider::new(&server.uri(), API_KEY);
    provider.complete_sign_in("at-1", None, None).await.unwrap();

    provider.sign_out().await.unwrap();
    assert_eq!(provider.current_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_sign_out_server_error() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": user_id })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "database unavailable" })))
        .mount(&server)
        .await;

    let provider = GoTrueProvider::new(&server.uri(), API_KEY);
    provider.complete_sign_in("at-1", None, None).await.unwrap();

    let result = provider.sign_out().await;

    assert_eq!(result, Err(Error::Provider("database unavailable".to_string())));
    assert!(provider.current_session().await.unwrap().is_some());
}
