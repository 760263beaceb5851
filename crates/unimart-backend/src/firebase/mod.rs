//! Hosted backend over its public REST APIs: the identity toolkit for
//! accounts, the document database, and object storage.

mod auth;
pub mod codec;
mod firestore;
mod storage;

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, BackendError, Result};
use crate::traits::{AuthUser, Backend};

/// Refresh the id token this long before it actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub identity_url: String,
    pub token_url: String,
    pub firestore_url: String,
    pub storage_url: String,
}

impl FirebaseConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            api_key: api_key.into(),
            storage_bucket: format!("{project_id}.appspot.com"),
            project_id,
            identity_url: "https://identitytoolkit.googleapis.com/v1".into(),
            token_url: "https://securetoken.googleapis.com/v1".into(),
            firestore_url: "https://firestore.googleapis.com/v1".into(),
            storage_url: "https://firebasestorage.googleapis.com".into(),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.storage_bucket = bucket.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::Config("missing api key".into()));
        }
        if self.project_id.trim().is_empty() {
            return Err(BackendError::Config("missing project id".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct TokenState {
    user: AuthUser,
    id_token: String,
    refresh_token: String,
    expires_at: Instant,
}

impl TokenState {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now() + TOKEN_SLACK
    }
}

pub struct FirebaseBackend {
    http: reqwest::Client,
    config: FirebaseConfig,
    session: RwLock<Option<TokenState>>,
}

impl FirebaseBackend {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;
        debug!(project = %config.project_id, "firebase backend ready");
        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
        })
    }

    fn session(&self) -> Option<TokenState> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, state: Option<TokenState>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// A valid id token for the signed-in user, refreshing it if needed.
    /// `None` when nobody is signed in.
    async fn bearer(&self) -> Result<Option<String>> {
        let Some(state) = self.session() else {
            return Ok(None);
        };
        if state.is_fresh() {
            return Ok(Some(state.id_token));
        }
        debug!(uid = %state.user.uid, "refreshing id token");
        let refreshed = self.refresh(&state.refresh_token, state.user.email.clone()).await?;
        let token = refreshed.id_token.clone();
        self.install(Some(refreshed));
        Ok(Some(token))
    }

    async fn require_bearer(&self) -> Result<String> {
        self.bearer().await?.ok_or(BackendError::Unauthenticated)
    }
}

impl Backend for FirebaseBackend {
    fn name(&self) -> &'static str {
        "firebase"
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Pass successful responses through and turn failures into errors.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(map_error(status, &body))
}

fn map_error(status: StatusCode, body: &str) -> BackendError {
    let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    match detail.as_ref().and_then(|d| d.status.as_deref()) {
        Some("PERMISSION_DENIED") => return BackendError::PermissionDenied(message),
        Some("NOT_FOUND") => return BackendError::NotFound(message),
        Some("UNAUTHENTICATED") => return BackendError::Unauthenticated,
        Some("UNAVAILABLE" | "DEADLINE_EXCEEDED") => return BackendError::Network(message),
        _ => {}
    }

    match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthenticated,
        StatusCode::FORBIDDEN => BackendError::PermissionDenied(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        s if s.is_server_error() => BackendError::Network(message),
        _ => BackendError::Protocol(message),
    }
}

/// Identity service failures carry their reason in the message code.
fn map_auth_error(status: StatusCode, body: &str) -> BackendError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(b) if !b.error.message.is_empty() => AuthError::from_code(&b.error.message).into(),
        _ => map_error(status, body),
    }
}
