//! Login, sign-up, and logout endpoints wrapping the auth collaborator,
//! plus the session view-model the header renders from.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::backend::AuthError;
use crate::errors::AppError;
use crate::models::session::Session;
use crate::state::AppState;
use crate::view::View;

pub const MISSING_CREDENTIALS_MESSAGE: &str = "Please enter both email and password.";
pub const UNAUTHORIZED_SIGNUP_MESSAGE: &str = "This email address is not authorized to register.";
pub const CONFIRMATION_SENT_MESSAGE: &str =
    "Sign up successful! Please check your email to confirm your account.";

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: Option<Session>,
    pub is_admin: bool,
    pub view: View,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub session: SessionView,
    /// Present when account confirmation is still pending.
    pub message: Option<&'static str>,
}

fn session_view(state: &AppState) -> SessionView {
    let user = state.sessions.current();
    // Role is re-derived from the session on every read, never cached.
    let is_admin = user.as_ref().is_some_and(|s| state.policy.is_admin(s));
    SessionView {
        user,
        is_admin,
        view: state.view.current(),
    }
}

fn require_credentials(req: &CredentialsRequest) -> Result<(), AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(MISSING_CREDENTIALS_MESSAGE.to_string()));
    }
    Ok(())
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<SessionView>, AppError> {
    require_credentials(&req)?;
    let session = state.backend.sign_in(req.email.trim(), &req.password).await?;
    state.sessions.replace(Some(session));
    Ok(Json(session_view(&state)))
}

/// POST /api/v1/auth/signup
/// The allow-list gate runs before any request leaves the process.
pub async fn handle_signup(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<SignUpResponse>, AppError> {
    require_credentials(&req)?;
    let email = req.email.trim();
    if !state.policy.may_register(email) {
        return Err(AppError::Auth(AuthError::Rejected(
            UNAUTHORIZED_SIGNUP_MESSAGE.to_string(),
        )));
    }

    let session = state.backend.sign_up(email, &req.password).await?;
    let message = session.is_none().then_some(CONFIRMATION_SENT_MESSAGE);
    if session.is_some() {
        state.sessions.replace(session);
    }
    Ok(Json(SignUpResponse {
        session: session_view(&state),
        message,
    }))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    state.backend.sign_out().await?;
    state.sessions.replace(None);
    Ok(Json(session_view(&state)))
}

/// GET /api/v1/session
pub async fn handle_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(session_view(&state))
}
