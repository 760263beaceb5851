use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use unimart_shared::UserId;

use super::{map_auth_error, FirebaseBackend, TokenState};
use crate::error::{AuthError, BackendError, Result};
use crate::traits::{AuthProvider, AuthSession, AuthUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// The token endpoint answers in snake_case.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(default)]
    email: Option<String>,
}

fn expiry(expires_in: &str) -> Instant {
    let secs = expires_in.parse::<u64>().unwrap_or(3600);
    Instant::now() + Duration::from_secs(secs)
}

impl FirebaseBackend {
    async fn identity_call(&self, endpoint: &str, body: serde_json::Value) -> Result<SignInResponse> {
        let url = format!("{}/accounts:{endpoint}", self.config.identity_url);
        let resp = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_auth_error(status, &body));
        }
        Ok(resp.json().await?)
    }

    fn start(&self, resp: SignInResponse) -> AuthSession {
        let user = AuthUser {
            uid: UserId(resp.local_id),
            email: resp.email,
        };
        self.install(Some(TokenState {
            user: user.clone(),
            id_token: resp.id_token,
            refresh_token: resp.refresh_token.clone(),
            expires_at: expiry(&resp.expires_in),
        }));
        AuthSession {
            user,
            refresh_token: resp.refresh_token,
        }
    }

    /// Exchange a refresh token for a new id token.
    pub(super) async fn refresh(&self, refresh_token: &str, email: Option<String>) -> Result<TokenState> {
        let url = format!("{}/token", self.config.token_url);
        let resp = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match map_auth_error(status, &body) {
                BackendError::Auth(AuthError::Other(_)) => AuthError::SessionExpired.into(),
                other => other,
            });
        }
        let resp: RefreshResponse = resp.json().await?;
        Ok(TokenState {
            user: AuthUser {
                uid: UserId(resp.user_id),
                email,
            },
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
            expires_at: expiry(&resp.expires_in),
        })
    }

    async fn lookup_email(&self, id_token: &str) -> Result<Option<String>> {
        let url = format!("{}/accounts:lookup", self.config.identity_url);
        let resp = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({ "idToken": id_token }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_auth_error(status, &body));
        }
        let resp: LookupResponse = resp.json().await?;
        Ok(resp.users.into_iter().next().and_then(|u| u.email))
    }
}

#[async_trait]
impl AuthProvider for FirebaseBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        let resp = self
            .identity_call(
                "signUp",
                json!({ "email": email.trim(), "password": password, "returnSecureToken": true }),
            )
            .await?;
        let session = self.start(resp);
        info!(uid = %session.user.uid, "account created");
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let resp = self
            .identity_call(
                "signInWithPassword",
                json!({ "email": email.trim(), "password": password, "returnSecureToken": true }),
            )
            .await?;
        let session = self.start(resp);
        info!(uid = %session.user.uid, "signed in");
        Ok(session)
    }

    async fn restore(&self, refresh_token: &str) -> Result<AuthSession> {
        let mut state = self.refresh(refresh_token, None).await?;
        state.user.email = self.lookup_email(&state.id_token).await?;
        debug!(uid = %state.user.uid, "session restored");

        let session = AuthSession {
            user: state.user.clone(),
            refresh_token: state.refresh_token.clone(),
        };
        self.install(Some(state));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.install(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session().map(|s| s.user)
    }
}
