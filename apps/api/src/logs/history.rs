//! The current user's log list and the refresher that keeps it live.
//!
//! The list is owned here and handed out as snapshots; nothing mutates it
//! from outside. A refresher runs per signed-in identity: one initial fetch,
//! then a re-fetch on every change notification from a subscription scoped
//! to that identity. Ordering (newest first) is delegated to the query.
//!
//! Every mutation is epoch-guarded: `clear` and `start_refresher` advance
//! the epoch, and a fetch that resolves under an old epoch is discarded, so
//! a slow response can never repopulate a view that has moved on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::backend::{Backend, LogQuery};
use crate::models::log::LogEntry;

#[derive(Default)]
pub struct History {
    entries: RwLock<Vec<LogEntry>>,
    epoch: AtomicU64,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.read().unwrap().clone()
    }

    /// Empties the list and invalidates any in-flight refresh (logout path).
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.write().unwrap().clear();
    }

    fn advance_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn epoch_is(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Installs fetched rows unless the epoch has moved on since the fetch
    /// started. Returns whether the rows were applied.
    fn apply(&self, epoch: u64, rows: Vec<LogEntry>) -> bool {
        let mut entries = self.entries.write().unwrap();
        if !self.epoch_is(epoch) {
            return false;
        }
        *entries = rows;
        true
    }
}

/// Stops the refresher task (and drops its change subscription) on drop.
pub struct RefresherHandle {
    task: JoinHandle<()>,
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts the refresher for one identity: initial fetch, then re-fetch per
/// change notification. The subscription dies with the returned handle.
pub fn start_refresher(
    history: Arc<History>,
    backend: Arc<dyn Backend>,
    user_id: Uuid,
) -> RefresherHandle {
    let epoch = history.advance_epoch();
    let task = tokio::spawn(async move {
        refresh(&history, backend.as_ref(), user_id, epoch).await;

        match backend.subscribe_to_log_changes(Some(user_id)).await {
            Ok(mut subscription) => {
                while subscription.recv().await.is_some() {
                    if !history.epoch_is(epoch) {
                        break;
                    }
                    refresh(&history, backend.as_ref(), user_id, epoch).await;
                }
                debug!("Change feed for {user_id} ended");
            }
            Err(e) => warn!("Log change subscription unavailable: {e}"),
        }
    });
    RefresherHandle { task }
}

async fn refresh(history: &History, backend: &dyn Backend, user_id: Uuid, epoch: u64) {
    match backend.query_logs(LogQuery::all_for_user(user_id)).await {
        Ok(page) => {
            if !history.apply(epoch, page.rows) {
                debug!("Discarding stale log fetch for {user_id}");
            }
        }
        // Prior displayed state is kept; the user can retry by reloading.
        Err(e) => error!("Error fetching logs: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::models::log::NewLogEntry;
    use std::time::Duration;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn test_initial_fetch_populates_newest_first() {
        let backend = Arc::new(MockBackend::new());
        let alice = backend.with_user("alice@tie.ust", "pw");
        let base = chrono::Utc::now();
        backend.seed_log(alice.user_id, "alice@tie.ust", "p1", "a1", base);
        backend.seed_log(
            alice.user_id,
            "alice@tie.ust",
            "p2",
            "a2",
            base + chrono::Duration::seconds(60),
        );

        let history = Arc::new(History::new());
        let _handle = start_refresher(history.clone(), backend.clone(), alice.user_id);

        {
            let history = history.clone();
            wait_until(move || history.snapshot().len() == 2).await;
        }
        let rows = history.snapshot();
        assert_eq!(rows[0].plan, "p2");
        assert_eq!(rows[1].plan, "p1");
    }

    #[tokio::test]
    async fn test_change_notification_triggers_refetch() {
        let backend = Arc::new(MockBackend::new());
        let alice = backend.with_user("alice@tie.ust", "pw");
        let history = Arc::new(History::new());
        let _handle = start_refresher(history.clone(), backend.clone(), alice.user_id);

        // Let the initial (empty) fetch land before inserting.
        {
            let calls = backend.clone();
            wait_until(move || calls.query_calls.load(Ordering::SeqCst) >= 1).await;
        }

        backend
            .insert_log(NewLogEntry {
                user_id: alice.user_id,
                user_email: "alice@tie.ust".to_string(),
                plan: "P".to_string(),
                achievement: "A".to_string(),
            })
            .await
            .unwrap();

        let snapshot = history.clone();
        wait_until(move || {
            let rows = snapshot.snapshot();
            rows.first().map(|e| e.plan.as_str()) == Some("P")
        })
        .await;
    }

    #[test]
    fn test_clear_discards_late_responses() {
        let history = History::new();
        let epoch = history.advance_epoch();
        history.clear();

        let applied = history.apply(
            epoch,
            vec![], // contents irrelevant; the epoch decides
        );
        assert!(!applied);
        assert!(history.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_new_refresher_invalidates_old_epoch() {
        let backend = Arc::new(MockBackend::new());
        let alice = backend.with_user("alice@tie.ust", "pw");
        let history = Arc::new(History::new());

        let old_epoch = history.advance_epoch();
        let _handle = start_refresher(history.clone(), backend.clone(), alice.user_id);
        assert!(!history.apply(old_epoch, vec![]));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_prior_state() {
        let backend = Arc::new(MockBackend::new());
        let alice = backend.with_user("alice@tie.ust", "pw");
        backend.seed_log(alice.user_id, "alice@tie.ust", "p1", "a1", chrono::Utc::now());

        let history = Arc::new(History::new());
        let _handle = start_refresher(history.clone(), backend.clone(), alice.user_id);
        {
            let history = history.clone();
            wait_until(move || history.snapshot().len() == 1).await;
        }

        backend.fail_queries.store(true, Ordering::SeqCst);
        let epoch = history.epoch.load(Ordering::SeqCst);
        refresh(&history, backend.as_ref(), alice.user_id, epoch).await;
        assert_eq!(history.snapshot().len(), 1);
    }
}
