use std::sync::Arc;

use tokio::sync::Mutex;

use crate::admin::dashboard::DashboardState;
use crate::backend::Backend;
use crate::logs::form::FormStatus;
use crate::logs::history::History;
use crate::policy::AccessPolicy;
use crate::session::SessionStore;
use crate::view::ViewState;

/// Shared application state injected into all route handlers via Axum
/// extractors. Each piece is owned by exactly one component: the session
/// store mutates the session, the history refresher mutates the log list,
/// the admin handlers mutate the dashboard; everything else reads.
#[derive(Clone)]
pub struct AppState {
    /// The data-access layer; the only path to the external service.
    pub backend: Arc<dyn Backend>,
    pub sessions: SessionStore,
    pub policy: AccessPolicy,
    pub history: Arc<History>,
    pub form: FormStatus,
    pub dashboard: Arc<Mutex<DashboardState>>,
    pub view: ViewState,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, sessions: SessionStore, policy: AccessPolicy) -> Self {
        AppState {
            backend,
            sessions,
            policy,
            history: Arc::new(History::new()),
            form: FormStatus::new(),
            dashboard: Arc::new(Mutex::new(DashboardState::default())),
            view: ViewState::default(),
        }
    }
}
