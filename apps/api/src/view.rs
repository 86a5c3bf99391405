use std::sync::{Arc, RwLock};

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::state::AppState;

/// Which composition a signed-in user currently sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Student,
    Admin,
}

impl View {
    fn toggled(self) -> View {
        match self {
            View::Student => View::Admin,
            View::Admin => View::Student,
        }
    }
}

/// Process-wide current view. Every sign-in lands back on Student.
#[derive(Clone)]
pub struct ViewState {
    inner: Arc<RwLock<View>>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            inner: Arc::new(RwLock::new(View::Student)),
        }
    }
}

impl ViewState {
    pub fn current(&self) -> View {
        *self.inner.read().unwrap()
    }

    pub fn set(&self, view: View) {
        *self.inner.write().unwrap() = view;
    }
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view: View,
    /// Whether the toggle is offered at all.
    pub is_admin: bool,
}

fn view_response(state: &AppState) -> Result<ViewResponse, AppError> {
    let session = state.sessions.current().ok_or(AppError::Unauthorized)?;
    Ok(ViewResponse {
        view: state.view.current(),
        is_admin: state.policy.is_admin(&session),
    })
}

/// GET /api/v1/view
pub async fn handle_get_view(State(state): State<AppState>) -> Result<Json<ViewResponse>, AppError> {
    Ok(Json(view_response(&state)?))
}

/// POST /api/v1/view/toggle
/// A no-op for identities the access policy does not mark as admin; the
/// admin content endpoints re-check the policy on their own.
pub async fn handle_toggle_view(
    State(state): State<AppState>,
) -> Result<Json<ViewResponse>, AppError> {
    let session = state.sessions.current().ok_or(AppError::Unauthorized)?;
    if state.policy.is_admin(&session) {
        state.view.set(state.view.current().toggled());
    }
    Ok(Json(view_response(&state)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::policy::AccessPolicy;
    use crate::session::SessionStore;
    use std::sync::Arc;

    fn state_with_user(email: &str) -> AppState {
        let backend = Arc::new(MockBackend::new());
        let session = backend.with_user(email, "pw");
        let state = AppState::new(
            backend,
            SessionStore::empty(),
            AccessPolicy::new(&["admin@tie.ust"], &[]),
        );
        state.sessions.replace(Some(session));
        state
    }

    #[tokio::test]
    async fn test_admin_can_toggle_back_and_forth() {
        let state = state_with_user("admin@tie.ust");
        let Json(resp) = handle_toggle_view(State(state.clone())).await.unwrap();
        assert_eq!(resp.view, View::Admin);
        assert!(resp.is_admin);
        let Json(resp) = handle_toggle_view(State(state)).await.unwrap();
        assert_eq!(resp.view, View::Student);
    }

    #[tokio::test]
    async fn test_toggle_is_a_noop_for_students() {
        let state = state_with_user("student@tie.ust");
        for _ in 0..3 {
            let Json(resp) = handle_toggle_view(State(state.clone())).await.unwrap();
            assert_eq!(resp.view, View::Student);
            assert!(!resp.is_admin);
        }
    }

    #[tokio::test]
    async fn test_view_requires_session() {
        let backend = Arc::new(MockBackend::new());
        let state = AppState::new(backend, SessionStore::empty(), AccessPolicy::default());
        assert!(matches!(
            handle_get_view(State(state)).await,
            Err(AppError::Unauthorized)
        ));
    }
}
