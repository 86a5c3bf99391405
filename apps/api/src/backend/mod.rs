//! Data-access layer: the only interface through which the application
//! reaches the external auth/storage/realtime service.
//!
//! ARCHITECTURAL RULE: no other module may talk to the service directly.
//! Components depend on the `Backend` trait, carried in `AppState` as an
//! `Arc<dyn Backend>`; the production implementation is `RestBackend`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::log::{LogEntry, NewLogEntry};
use crate::models::session::Session;

pub mod realtime;
pub mod rest;

#[cfg(test)]
pub mod mock;

/// Authentication failures. `Rejected` carries the service's own message,
/// which the login form shows verbatim.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("Auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not signed in")]
    NotSignedIn,
}

/// Storage failures. `Rejected` carries the service's own message, which the
/// submission form shows verbatim.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Rejected(String),

    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed storage response: {0}")]
    Decode(String),

    #[error("Not signed in")]
    NotSignedIn,
}

/// One page request against the log table. Results are always ordered by
/// `created_at` descending; `limit: None` means no range is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub filter_user_id: Option<Uuid>,
    pub offset: u32,
    pub limit: Option<u32>,
    pub with_count: bool,
}

impl LogQuery {
    /// Everything a single user has submitted, newest first.
    pub fn all_for_user(user_id: Uuid) -> Self {
        LogQuery {
            filter_user_id: Some(user_id),
            offset: 0,
            limit: None,
            with_count: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogPage {
    pub rows: Vec<LogEntry>,
    /// Total rows matching the filter; present iff `with_count` was set.
    pub count: Option<u64>,
}

/// A standing change-notification registration with an explicit stop
/// lifecycle: `recv` yields a unit for every insert/update/delete matching
/// the subscribed filter, and dropping the subscription tears down the
/// transport task behind it.
pub struct ChangeSubscription {
    rx: mpsc::Receiver<()>,
    task: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn new(rx: mpsc::Receiver<()>, task: Option<JoinHandle<()>>) -> Self {
        ChangeSubscription { rx, task }
    }

    /// Awaits the next change notification. `None` means the feed has ended
    /// (socket closed or sender dropped); there is no automatic reconnect.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The capability surface this application consumes from the external
/// service: sign-in/up/out, session retrieval, row insert, filtered/ordered/
/// ranged row queries with optional exact counts, and change subscriptions.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// `Ok(None)` means the account was created but a confirmation email is
    /// pending, so no session exists yet.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn get_session(&self) -> Option<Session>;

    async fn insert_log(&self, new: NewLogEntry) -> Result<LogEntry, StorageError>;

    async fn query_logs(&self, query: LogQuery) -> Result<LogPage, StorageError>;

    /// Subscribes to change notifications for rows matching `filter_user_id`
    /// (`None` subscribes to the whole table).
    async fn subscribe_to_log_changes(
        &self,
        filter_user_id: Option<Uuid>,
    ) -> Result<ChangeSubscription, StorageError>;
}
