use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::admin::dashboard::{
    distinct_owners, page_range, total_pages, truncate_preview, DashboardState, LogOwner,
    LOGS_PER_PAGE, OWNER_SCAN_LIMIT,
};
use crate::backend::LogQuery;
use crate::errors::AppError;
use crate::models::log::LogEntry;
use crate::models::session::Session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    /// `None` shows all team members.
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AdminRow {
    pub id: i64,
    #[serde(rename = "userEmail")]
    pub user_email: String,
    pub date: chrono::NaiveDate,
    pub plan: String,
    pub achievement: String,
    /// Collapsed-cell previews; the full text above is shown when expanded.
    pub plan_preview: String,
    pub achievement_preview: String,
    pub expanded: bool,
}

#[derive(Debug, Serialize)]
pub struct AdminView {
    pub page: u32,
    pub total_pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub filter: Option<Uuid>,
    pub owners: Vec<LogOwner>,
    pub rows: Vec<AdminRow>,
    pub empty_message: Option<&'static str>,
}

pub const EMPTY_TABLE_MESSAGE: &str = "No logs found.";

fn require_admin(state: &AppState) -> Result<Session, AppError> {
    let session = state.sessions.current().ok_or(AppError::Unauthorized)?;
    if !state.policy.is_admin(&session) {
        return Err(AppError::Forbidden);
    }
    Ok(session)
}

fn render_row(entry: &LogEntry, expanded_row: Option<i64>) -> AdminRow {
    AdminRow {
        id: entry.id,
        user_email: entry.user_email.clone(),
        date: entry.date,
        plan: entry.plan.clone(),
        achievement: entry.achievement.clone(),
        plan_preview: truncate_preview(&entry.plan),
        achievement_preview: truncate_preview(&entry.achievement),
        expanded: expanded_row == Some(entry.id),
    }
}

fn render(dash: &DashboardState) -> AdminView {
    AdminView {
        page: dash.page,
        total_pages: dash.total_pages,
        has_prev: dash.has_prev(),
        has_next: dash.has_next(),
        filter: dash.filter,
        owners: dash.owners.clone(),
        rows: dash
            .rows
            .iter()
            .map(|e| render_row(e, dash.expanded_row))
            .collect(),
        empty_message: dash.rows.is_empty().then_some(EMPTY_TABLE_MESSAGE),
    }
}

/// Fetches the current page (rows plus exact count). A failure, such as the
/// admin lacking read access to other users' rows, is logged and leaves the
/// prior state displayed; there is no error banner in this view.
async fn load_page(state: &AppState, dash: &mut DashboardState) {
    let (from, _to) = page_range(dash.page);
    let query = LogQuery {
        filter_user_id: dash.filter,
        offset: from,
        limit: Some(LOGS_PER_PAGE),
        with_count: true,
    };
    match state.backend.query_logs(query).await {
        Ok(page) => {
            dash.rows = page.rows;
            if let Some(count) = page.count {
                dash.total_pages = total_pages(count);
            }
        }
        Err(e) => error!("Error fetching logs for admin: {e}"),
    }
}

/// One-off owner scan for the filter dropdown. Staleness is accepted: new
/// submitters appear only after the dashboard state is rebuilt.
async fn load_owners(state: &AppState, dash: &mut DashboardState) {
    let query = LogQuery {
        filter_user_id: None,
        offset: 0,
        limit: Some(OWNER_SCAN_LIMIT),
        with_count: false,
    };
    match state.backend.query_logs(query).await {
        Ok(page) => dash.owners = distinct_owners(&page.rows),
        Err(e) => error!("Error fetching log owners for admin: {e}"),
    }
}

async fn ensure_initialized(state: &AppState, dash: &mut DashboardState) {
    if !dash.initialized {
        load_owners(state, dash).await;
        load_page(state, dash).await;
        dash.initialized = true;
    }
}

/// GET /api/v1/admin/logs
pub async fn handle_dashboard(State(state): State<AppState>) -> Result<Json<AdminView>, AppError> {
    require_admin(&state)?;
    let mut dash = state.dashboard.lock().await;
    ensure_initialized(&state, &mut dash).await;
    Ok(Json(render(&dash)))
}

/// POST /api/v1/admin/logs/next
pub async fn handle_next_page(State(state): State<AppState>) -> Result<Json<AdminView>, AppError> {
    require_admin(&state)?;
    let mut dash = state.dashboard.lock().await;
    ensure_initialized(&state, &mut dash).await;
    if dash.next_page() {
        load_page(&state, &mut dash).await;
    }
    Ok(Json(render(&dash)))
}

/// POST /api/v1/admin/logs/prev
pub async fn handle_prev_page(State(state): State<AppState>) -> Result<Json<AdminView>, AppError> {
    require_admin(&state)?;
    let mut dash = state.dashboard.lock().await;
    ensure_initialized(&state, &mut dash).await;
    if dash.prev_page() {
        load_page(&state, &mut dash).await;
    }
    Ok(Json(render(&dash)))
}

/// POST /api/v1/admin/filter
pub async fn handle_set_filter(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<AdminView>, AppError> {
    require_admin(&state)?;
    let mut dash = state.dashboard.lock().await;
    ensure_initialized(&state, &mut dash).await;
    dash.set_filter(req.user_id);
    load_page(&state, &mut dash).await;
    Ok(Json(render(&dash)))
}

/// POST /api/v1/admin/logs/:id/toggle
pub async fn handle_toggle_row(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AdminView>, AppError> {
    require_admin(&state)?;
    let mut dash = state.dashboard.lock().await;
    dash.toggle_row(id);
    Ok(Json(render(&dash)))
}
