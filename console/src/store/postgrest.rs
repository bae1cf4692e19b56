//! PostgREST data store client.

use async_trait::async_trait;
use clan_common::{
    Permission, Profile, ProfileSummary, Recruit, Session, PROFILE_COLUMNS, RECRUIT_COLUMNS,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::DataStore;
use crate::error::{Error, Result};

/// Media type asking PostgREST for exactly one row as a JSON object.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// `.single()` matched zero (or several) rows.
const NO_SINGLE_ROW: &str = "PGRST116";

/// Postgres `insufficient_privilege`.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Data store backed by a PostgREST endpoint.
pub struct PostgrestStore {
    http_client: Client,
    base_url: String,
    api_key: String,
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl PostgrestStore {
    /// `project_url` is the hosted project root; the REST API lives under `/rest/v1`.
    pub fn new(project_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str, session: &Session) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
    }

    async fn rpc(&self, session: &Session, name: &str, args: Value) -> Result<Response> {
        let response = self
            .request(Method::POST, &format!("rpc/{}", name), session)
            .json(&args)
            .send()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;
        check(response).await
    }
}

#[async_trait]
impl DataStore for PostgrestStore {
    async fn fetch_own_profile(&self, session: &Session) -> Result<Profile> {
        let response = self
            .request(Method::GET, "profiles", session)
            .query(&[("select", PROFILE_COLUMNS)])
            .header("Accept", SINGLE_OBJECT)
            .send()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        decode(check(response).await?).await
    }

    async fn update_display_name_override(
        &self,
        session: &Session,
        user_id: Uuid,
        value: Option<&str>,
    ) -> Result<()> {
        let response = self
            .request(Method::PATCH, "profiles", session)
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "display_name_override": value }))
            .send()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        check(response).await.map(|_| ())
    }

    async fn sync_profile_from_auth(&self, session: &Session, force: bool) -> Result<()> {
        self.rpc(session, "sync_profile_from_auth", json!({ "force": force }))
            .await
            .map(|_| ())
    }

    async fn set_user_permission(
        &self,
        session: &Session,
        target_user_id: Uuid,
        permission: Permission,
    ) -> Result<()> {
        self.rpc(
            session,
            "set_user_permission",
            json!({
                "target_user_id": target_user_id,
                "new_permission": permission,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn list_profiles_for_owner(&self, session: &Session) -> Result<Vec<ProfileSummary>> {
        let response = self
            .rpc(session, "list_profiles_for_owner", json!({}))
            .await?;
        let rows: Option<Vec<ProfileSummary>> = decode(response).await?;
        Ok(rows.unwrap_or_default())
    }

    async fn list_recruits(&self, session: &Session) -> Result<Vec<Recruit>> {
        let response = self
            .request(Method::GET, "recruits", session)
            .query(&[("select", RECRUIT_COLUMNS), ("order", "created_at.desc")])
            .send()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        decode(check(response).await?).await
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: PostgrestError = response.json().await.unwrap_or_default();
    let message = body
        .message
        .or(body.details)
        .unwrap_or_else(|| format!("PostgREST returned {}", status));

    Err(match body.code.as_deref() {
        Some(NO_SINGLE_ROW) => Error::NotFound,
        Some(INSUFFICIENT_PRIVILEGE) => Error::Privilege(message),
        _ => Error::Query(message),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::Query(format!("Unexpected response: {}", e)))
}
