//! Process-wide session store and the auth change listener.
//!
//! Exactly one session value is active at a time. It lives in a watch
//! channel owned by the store; everything else reads it or subscribes to
//! transitions. The watcher task is the single place that reacts to those
//! transitions: it resets the view, restarts the history refresher for the
//! new identity, and clears locally held data on sign-out.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::backend::Backend;
use crate::logs::history::{start_refresher, RefresherHandle};
use crate::models::session::Session;
use crate::state::AppState;
use crate::view::View;

#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionStore {
    /// Retrieves the current session from the collaborator once at startup.
    /// There is no retry; an absent session leaves the user unauthenticated.
    pub async fn init(backend: &dyn Backend) -> Self {
        let initial = backend.get_session().await;
        SessionStore {
            tx: Arc::new(watch::channel(initial).0),
        }
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        SessionStore {
            tx: Arc::new(watch::channel(None).0),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Installs a new session value (sign-in, sign-up confirmation) or clears
    /// it (sign-out). Subscribers observe the transition.
    pub fn replace(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

/// The auth change listener. On every transition the visible identity is
/// re-read and the dependent state rebuilt: sign-in resets the view to
/// Student and starts a history refresher scoped to the new identity;
/// sign-out drops the refresher (and with it the change subscription),
/// clears the log list, and resets the dashboard.
pub fn spawn_session_watcher(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = state.sessions.subscribe();
        let mut refresher: Option<RefresherHandle> = None;
        let mut current_user: Option<Uuid> = None;

        loop {
            let session = rx.borrow_and_update().clone();
            let user_id = session.as_ref().map(|s| s.user_id);

            if user_id != current_user {
                // The old identity's list must never leak into the new one.
                refresher.take();
                state.history.clear();
                state.dashboard.lock().await.reset();
                state.view.set(View::Student);

                if let Some(session) = &session {
                    info!("Session changed: {}", session.email_label());
                    refresher.replace(start_refresher(
                        state.history.clone(),
                        state.backend.clone(),
                        session.user_id,
                    ));
                } else {
                    info!("Session cleared");
                }
                current_user = user_id;
            }

            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}
