//! GoTrue + PostgREST client: the production `Backend` implementation.
//!
//! The access token lives only in this process. Offline persistence is out
//! of scope, so a fresh process always starts unauthenticated.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::backend::realtime::spawn_change_feed;
use crate::backend::{AuthError, Backend, ChangeSubscription, LogPage, LogQuery, StorageError};
use crate::models::log::{decode_rows, LogEntry, NewLogEntry, RawLogRow};
use crate::models::session::Session;

const LOGS_TABLE: &str = "logs";

/// Authenticated user object as the auth API returns it.
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// Error bodies differ between the auth API (`error_description` or `msg`)
/// and the REST API (`message`); collect whichever is present.
#[derive(Debug, Deserialize, Default)]
struct ServiceErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

fn service_error_message(status: StatusCode, body: &str) -> String {
    let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .unwrap_or_else(|| format!("Request failed with status {status}"))
}

/// Total extracted from a PostgREST `Content-Range` header, e.g. `0-9/57`
/// or `*/0`. `*` totals (count not requested) yield `None`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.parse().ok()
}

struct AuthState {
    access_token: String,
    session: Session,
}

pub struct RestBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    auth: RwLock<Option<AuthState>>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        RestBackend {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            auth: RwLock::new(None),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Websocket endpoint for the realtime channel, derived from the base URL.
    fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("wss://{}", self.base_url)
        };
        format!(
            "{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.anon_key
        )
    }

    /// Bearer for REST calls: the user's access token once signed in, the
    /// anon key otherwise. Row-level security on the service side decides
    /// what each bearer may read.
    async fn bearer(&self) -> String {
        match self.auth.read().await.as_ref() {
            Some(state) => state.access_token.clone(),
            None => self.anon_key.clone(),
        }
    }

    fn rest_headers(&self, bearer: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            headers.insert("Authorization", v);
        }
        headers
    }

    async fn token_request(
        &self,
        url: String,
        email: &str,
        password: &str,
    ) -> Result<reqwest::Response, AuthError> {
        Ok(self
            .http
            .post(url)
            .headers(self.rest_headers(&self.anon_key))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .token_request(
                format!("{}?grant_type=password", self.auth_url("token")),
                email,
                password,
            )
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected(service_error_message(status, &body)));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Rejected(format!("Malformed auth response: {e}")))?;
        let session = Session {
            user_id: token.user.id,
            email: token.user.email,
        };
        *self.auth.write().await = Some(AuthState {
            access_token: token.access_token,
            session: session.clone(),
        });
        info!("Signed in as {}", session.email_label());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        let response = self
            .token_request(self.auth_url("signup"), email, password)
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected(service_error_message(status, &body)));
        }

        // With email confirmation enabled the service answers with a bare
        // user object; with autoconfirm it answers with a full token grant.
        if let Ok(token) = serde_json::from_str::<TokenResponse>(&body) {
            let session = Session {
                user_id: token.user.id,
                email: token.user.email,
            };
            *self.auth.write().await = Some(AuthState {
                access_token: token.access_token,
                session: session.clone(),
            });
            return Ok(Some(session));
        }
        Ok(None)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = match self.auth.read().await.as_ref() {
            Some(state) => state.access_token.clone(),
            None => return Err(AuthError::NotSignedIn),
        };

        let response = self
            .http
            .post(self.auth_url("logout"))
            .headers(self.rest_headers(&token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(service_error_message(status, &body)));
        }
        *self.auth.write().await = None;
        Ok(())
    }

    async fn get_session(&self) -> Option<Session> {
        self.auth.read().await.as_ref().map(|s| s.session.clone())
    }

    async fn insert_log(&self, new: NewLogEntry) -> Result<LogEntry, StorageError> {
        if self.auth.read().await.is_none() {
            return Err(StorageError::NotSignedIn);
        }
        let bearer = self.bearer().await;

        let response = self
            .http
            .post(self.rest_url(LOGS_TABLE))
            .headers(self.rest_headers(&bearer))
            .header("Prefer", "return=representation")
            .json(&[new])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Rejected(service_error_message(status, &body)));
        }

        let rows: Vec<RawLogRow> = serde_json::from_str(&body)
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::Decode("insert returned no row".to_string()))?
            .decode()
            .map_err(|e| StorageError::Decode(e.to_string()))
    }

    async fn query_logs(&self, query: LogQuery) -> Result<LogPage, StorageError> {
        let bearer = self.bearer().await;

        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "created_at.desc".to_string()),
        ];
        if let Some(user_id) = query.filter_user_id {
            params.push(("userId".to_string(), format!("eq.{user_id}")));
        }

        let mut request = self
            .http
            .get(self.rest_url(LOGS_TABLE))
            .headers(self.rest_headers(&bearer))
            .query(&params);
        if let Some(limit) = query.limit {
            let to = query.offset + limit.saturating_sub(1);
            request = request
                .header("Range-Unit", "items")
                .header("Range", format!("{}-{}", query.offset, to));
        }
        if query.with_count {
            request = request.header("Prefer", "count=exact");
        }

        let response = request.send().await?;
        let status = response.status();
        let count = response
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Rejected(service_error_message(status, &body)));
        }

        let raw: Vec<RawLogRow> = serde_json::from_str(&body)
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(LogPage {
            rows: decode_rows(raw),
            count: if query.with_count { count } else { None },
        })
    }

    async fn subscribe_to_log_changes(
        &self,
        filter_user_id: Option<Uuid>,
    ) -> Result<ChangeSubscription, StorageError> {
        let (rx, task) = spawn_change_feed(self.realtime_url(), LOGS_TABLE, filter_user_id);
        Ok(ChangeSubscription::new(rx, Some(task)))
    }
}
