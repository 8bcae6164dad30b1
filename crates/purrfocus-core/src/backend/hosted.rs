//! Hosted backend -- Supabase-compatible REST API.
//!
//! Authentication goes through the GoTrue endpoints under `/auth/v1/`,
//! records through PostgREST tables `notes` and `habit_logs` under
//! `/rest/v1/`. Every record request is filtered by `user_id`. Provider
//! error messages are passed through verbatim. There is no retry.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use url::Url;

use super::RecordStore;
use crate::auth::{IdentityProvider, SessionBroadcast, User};
use crate::error::{AuthError, StoreError, ValidationError};
use crate::habits::HabitLogEntry;
use crate::notes::{Note, NotePatch};

const GENERIC_ERROR: &str = "An error occurred";

/// Tokens for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<RemoteUser> for User {
    fn from(remote: RemoteUser) -> Self {
        User {
            id: remote.id,
            email: remote.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: RemoteUser,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> String {
        [self.error_description, self.msg, self.message, self.error]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_ERROR.to_string())
    }
}

#[derive(Serialize)]
struct HabitRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    entry: &'a HabitLogEntry,
}

pub struct HostedBackend {
    client: Client,
    base_url: Url,
    anon_key: String,
    session: Mutex<Option<HostedSession>>,
    broadcast: SessionBroadcast,
}

impl HostedBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, ValidationError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized).map_err(|e| ValidationError::InvalidValue {
            field: "backend.url".into(),
            message: e.to_string(),
        })?;
        Ok(Self {
            client: Client::new(),
            base_url,
            anon_key: anon_key.to_string(),
            session: Mutex::new(None),
            broadcast: SessionBroadcast::default(),
        })
    }

    /// Current tokens, for persisting between runs.
    pub fn session(&self) -> Option<HostedSession> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-validate a stored access token. An expired or revoked token yields
    /// `Ok(None)` and leaves the backend signed out.
    pub async fn restore(
        &self,
        access_token: &str,
        refresh_token: Option<String>,
    ) -> Result<Option<User>, AuthError> {
        let resp = self
            .request(Method::GET, "auth/v1/user")
            .map_err(|e| AuthError::Provider(e.to_string()))?
            .bearer_auth(access_token)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED || resp.status() == StatusCode::FORBIDDEN {
            tracing::info!("stored session expired");
            self.set_session(None);
            return Ok(None);
        }
        let remote: RemoteUser = auth_json(resp).await?;
        let user = User::from(remote);
        self.set_session(Some(HostedSession {
            access_token: access_token.to_string(),
            refresh_token,
            user: user.clone(),
        }));
        Ok(Some(user))
    }

    fn set_session(&self, session: Option<HostedSession>) {
        let user = session.as_ref().map(|s| s.user.clone());
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session;
        self.broadcast.set(user);
    }

    fn bearer(&self) -> String {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, url::ParseError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer()))
    }

    fn rest(&self, method: Method, table: &str) -> Result<RequestBuilder, StoreError> {
        self.request(method, &format!("rest/v1/{table}"))
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    async fn password_grant(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let resp = self
            .request(Method::POST, "auth/v1/token")
            .map_err(|e| AuthError::Provider(e.to_string()))?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = auth_json(resp).await?;
        Ok(self.accept_token(token))
    }

    fn accept_token(&self, token: TokenResponse) -> User {
        let user = User::from(token.user);
        self.set_session(Some(HostedSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: user.clone(),
        }));
        user
    }
}

async fn error_message(resp: Response) -> String {
    let body = resp.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&body)
        .unwrap_or_default()
        .into_message()
}

async fn auth_json<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, AuthError> {
    if !resp.status().is_success() {
        return Err(AuthError::Provider(error_message(resp).await));
    }
    resp.json::<T>()
        .await
        .map_err(|e| AuthError::Provider(e.to_string()))
}

async fn store_json<T: for<'de> Deserialize<'de>>(
    resp: Response,
    operation: &str,
) -> Result<T, StoreError> {
    let resp = check(resp, operation).await?;
    Ok(resp.json::<T>().await?)
}

async fn check(resp: Response, operation: &str) -> Result<Response, StoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let message = error_message(resp).await;
    tracing::debug!(%status, operation, "store request rejected");
    Err(StoreError::Rejected {
        operation: operation.to_string(),
        message,
    })
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl IdentityProvider for HostedBackend {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let resp = self
            .request(Method::POST, "auth/v1/signup")
            .map_err(|e| AuthError::Provider(e.to_string()))?
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: serde_json::Value = auth_json(resp).await?;

        // With email confirmation disabled the provider signs the user in
        // right away; otherwise it only returns the user record.
        if body.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(body).map_err(|e| AuthError::Provider(e.to_string()))?;
            let user = self.accept_token(token);
            tracing::info!(user_id = %user.id, "hosted account created");
            return Ok(user);
        }
        let remote: RemoteUser = serde_json::from_value(body.get("user").cloned().unwrap_or(body))
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        let user = User::from(remote);
        tracing::info!(user_id = %user.id, "hosted account created, awaiting confirmation");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self.password_grant(email.trim(), password).await?;
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.session().is_none() {
            return Ok(());
        }
        let resp = self
            .request(Method::POST, "auth/v1/logout")
            .map_err(|e| AuthError::Provider(e.to_string()))?
            .send()
            .await?;
        // An already-invalid token still counts as signed out.
        if !resp.status().is_success() && resp.status() != StatusCode::UNAUTHORIZED {
            return Err(AuthError::Provider(error_message(resp).await));
        }
        self.set_session(None);
        tracing::info!("signed out");
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<User>, AuthError> {
        Ok(self.session().map(|s| s.user))
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.broadcast.subscribe()
    }
}

#[async_trait]
impl RecordStore for HostedBackend {
    async fn insert_note(&self, note: &Note) -> Result<Note, StoreError> {
        let resp = self
            .rest(Method::POST, "notes")?
            .header("Prefer", "return=representation")
            .json(&[note])
            .send()
            .await?;
        let mut rows: Vec<Note> = store_json(resp, "insert note").await?;
        if rows.is_empty() {
            return Err(StoreError::Decode("insert returned no rows".into()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        patch: &NotePatch,
    ) -> Result<Note, StoreError> {
        let resp = self
            .rest(Method::PATCH, "notes")?
            .query(&[("id", eq(id)), ("user_id", eq(user_id))])
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        let rows: Vec<Note> = store_json(resp, "update note").await?;
        rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            kind: "note",
            id: id.to_string(),
        })
    }

    async fn delete_note(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let resp = self
            .rest(Method::DELETE, "notes")?
            .query(&[("id", eq(id)), ("user_id", eq(user_id))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<Note> = store_json(resp, "delete note").await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                kind: "note",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, StoreError> {
        let resp = self
            .rest(Method::GET, "notes")?
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;
        store_json(resp, "list notes").await
    }

    async fn append_habit_log(
        &self,
        user_id: &str,
        entry: &HabitLogEntry,
    ) -> Result<(), StoreError> {
        let resp = self
            .rest(Method::POST, "habit_logs")?
            .header("Prefer", "return=minimal")
            .json(&[HabitRow { user_id, entry }])
            .send()
            .await?;
        check(resp, "append habit log").await?;
        Ok(())
    }

    async fn list_habit_logs(&self, user_id: &str) -> Result<Vec<HabitLogEntry>, StoreError> {
        let resp = self
            .rest(Method::GET, "habit_logs")?
            .query(&[
                ("select", "date,focus_minutes,completed_sessions".to_string()),
                ("user_id", eq(user_id)),
                ("order", "date.asc".to_string()),
            ])
            .send()
            .await?;
        store_json(resp, "list habit logs").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let backend = HostedBackend::new("https://abc.supabase.co/project", "anon").unwrap();
        let url = backend.base_url.join("auth/v1/signup").unwrap();
        assert_eq!(url.as_str(), "https://abc.supabase.co/project/auth/v1/signup");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HostedBackend::new("not a url", "anon").is_err());
    }

    #[test]
    fn error_body_prefers_description() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.into_message(), "Invalid login credentials");
        assert_eq!(ErrorBody::default().into_message(), GENERIC_ERROR);
    }

    #[test]
    fn habit_row_flattens_entry() {
        let entry = HabitLogEntry::for_session(
            chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            25,
        );
        let row = serde_json::to_value(HabitRow {
            user_id: "u1",
            entry: &entry,
        })
        .unwrap();
        assert_eq!(
            row,
            json!({
                "user_id": "u1",
                "date": "2026-10-19",
                "focus_minutes": 25,
                "completed_sessions": 1
            })
        );
    }

    #[tokio::test]
    async fn sign_out_without_session_is_noop() {
        let backend = HostedBackend::new("http://127.0.0.1:9", "anon").unwrap();
        backend.sign_out().await.unwrap();
        assert!(backend.get_session().await.unwrap().is_none());
    }
}
