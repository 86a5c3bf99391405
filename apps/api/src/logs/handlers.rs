use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::logs::form;
use crate::models::log::LogEntry;
use crate::state::AppState;

pub const EMPTY_HISTORY_MESSAGE: &str = "No logs yet!";

#[derive(Debug, Deserialize)]
pub struct SubmitLogRequest {
    pub plan: String,
    pub achievement: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub entries: Vec<LogEntry>,
    /// Present only when there is nothing to show.
    pub empty_message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct FormView {
    pub submitting: bool,
    pub message: Option<String>,
}

/// POST /api/v1/logs
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitLogRequest>,
) -> Result<Json<LogEntry>, AppError> {
    let session = state.sessions.current().ok_or(AppError::Unauthorized)?;
    let entry = form::submit_log(
        &state.form,
        state.backend.as_ref(),
        &session,
        &req.plan,
        &req.achievement,
    )
    .await?;
    Ok(Json(entry))
}

/// GET /api/v1/logs
/// Renders whatever the refresher last applied; ordering comes from the
/// query, not from here.
pub async fn handle_history(
    State(state): State<AppState>,
) -> Result<Json<HistoryView>, AppError> {
    state.sessions.current().ok_or(AppError::Unauthorized)?;
    let entries = state.history.snapshot();
    let empty_message = entries.is_empty().then_some(EMPTY_HISTORY_MESSAGE);
    Ok(Json(HistoryView {
        entries,
        empty_message,
    }))
}

/// GET /api/v1/logs/form
pub async fn handle_form_status(
    State(state): State<AppState>,
) -> Result<Json<FormView>, AppError> {
    state.sessions.current().ok_or(AppError::Unauthorized)?;
    Ok(Json(FormView {
        submitting: state.form.is_submitting(),
        message: state.form.message(),
    }))
}
