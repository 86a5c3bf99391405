pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::state::AppState;
use crate::{admin, auth, logs, view};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route("/api/v1/auth/signup", post(auth::handle_signup))
        .route("/api/v1/auth/logout", post(auth::handle_logout))
        .route("/api/v1/session", get(auth::handle_session))
        // View router
        .route("/api/v1/view", get(view::handle_get_view))
        .route("/api/v1/view/toggle", post(view::handle_toggle_view))
        // Student view: submission form + own history
        .route(
            "/api/v1/logs",
            get(logs::handlers::handle_history).post(logs::handlers::handle_submit),
        )
        .route("/api/v1/logs/form", get(logs::handlers::handle_form_status))
        // Admin view
        .route("/api/v1/admin/logs", get(admin::handlers::handle_dashboard))
        .route(
            "/api/v1/admin/logs/next",
            post(admin::handlers::handle_next_page),
        )
        .route(
            "/api/v1/admin/logs/prev",
            post(admin::handlers::handle_prev_page),
        )
        .route(
            "/api/v1/admin/filter",
            post(admin::handlers::handle_set_filter),
        )
        .route(
            "/api/v1/admin/logs/:id/toggle",
            post(admin::handlers::handle_toggle_row),
        )
        .with_state(state)
}

async fn not_configured() -> AppError {
    AppError::Configuration
}

/// Served instead of the application while the service credentials still
/// hold their placeholder values: every path answers with the
/// configuration-error state and no feature is reachable.
pub fn build_unconfigured_router() -> Router {
    Router::new().fallback(not_configured)
}
