use chrono::Utc;
use tracing::{info, warn};
use unimart_backend::{AuthError, AuthSession, AuthUser, BackendError};
use unimart_shared::validation::{SignInForm, SignupForm};
use unimart_store::StoredSession;

use super::report_failure;
use crate::error::{ClientError, Result};
use crate::state::AppState;

fn persist(state: &AppState, session: &AuthSession) -> Result<()> {
    let stored = StoredSession {
        user_id: session.user.uid.clone(),
        email: session.user.email.clone(),
        refresh_token: session.refresh_token.clone(),
        saved_at: Utc::now(),
    };
    state.with_db(|db| db.save_session(&stored))
}

/// Create an account and sign in as it.
pub async fn sign_up(state: &AppState, form: &SignupForm) -> Result<AuthUser> {
    let result = async {
        form.validate()?;
        let session = state
            .backend()
            .sign_up(form.email.trim(), &form.password)
            .await?;
        persist(state, &session)?;
        Ok::<_, ClientError>(session.user)
    }
    .await;

    let user = report_failure(state, result, "")?;
    state.publish_auth();
    info!(uid = %user.uid, "account created");
    state.notifier().success("Account created successfully");
    Ok(user)
}

pub async fn sign_in(state: &AppState, form: &SignInForm) -> Result<AuthUser> {
    let result = async {
        form.validate()?;
        let session = state
            .backend()
            .sign_in(form.email.trim(), &form.password)
            .await?;
        persist(state, &session)?;
        Ok::<_, ClientError>(session.user)
    }
    .await;

    let user = report_failure(state, result, "")?;
    state.publish_auth();
    info!(uid = %user.uid, "signed in");
    state.notifier().success("Logged in successfully");
    Ok(user)
}

/// Sign back in from the session persisted on this device. Returns `None`
/// when there is no session or it is no longer valid; a stale session is
/// forgotten.
pub async fn restore_session(state: &AppState) -> Result<Option<AuthUser>> {
    let Some(stored) = state.with_db(|db| db.load_session())? else {
        return Ok(None);
    };

    match state.backend().restore(&stored.refresh_token).await {
        Ok(session) => {
            persist(state, &session)?;
            state.publish_auth();
            info!(uid = %session.user.uid, "session restored");
            Ok(Some(session.user))
        }
        Err(BackendError::Auth(AuthError::SessionExpired | AuthError::UserDisabled)) => {
            warn!(uid = %stored.user_id, "stored session rejected, signing out");
            state.with_db(|db| db.clear_session())?;
            Ok(None)
        }
        Err(e) => Err(ClientError::from(e)),
    }
}

pub async fn sign_out(state: &AppState) -> Result<()> {
    let result = async {
        state.backend().sign_out().await?;
        state.with_db(|db| db.clear_session())?;
        Ok::<_, ClientError>(())
    }
    .await;

    report_failure(state, result, "")?;
    state.publish_auth();
    info!("signed out");
    state.notifier().success("Logged out successfully");
    Ok(())
}

pub fn current_user(state: &AppState) -> Option<AuthUser> {
    state.current_user()
}
