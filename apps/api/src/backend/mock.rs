//! In-memory collaborator used by unit tests: real filter/order/range/count
//! query semantics, server-assigned ids and timestamps, change notification
//! on insert, and switchable failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::{AuthError, Backend, ChangeSubscription, LogPage, LogQuery, StorageError};
use crate::models::log::{LogEntry, NewLogEntry};
use crate::models::session::Session;

#[derive(Default)]
pub struct MockBackend {
    users: Mutex<HashMap<String, (String, Uuid)>>,
    session: Mutex<Option<Session>>,
    logs: Mutex<Vec<LogEntry>>,
    next_id: AtomicI64,
    subscribers: Mutex<Vec<(Option<Uuid>, mpsc::Sender<()>)>>,
    pub fail_inserts: AtomicBool,
    pub fail_queries: AtomicBool,
    pub insert_calls: AtomicU32,
    pub query_calls: AtomicU32,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend::default()
    }

    /// Registers an account and returns its identity.
    pub fn with_user(&self, email: &str, password: &str) -> Session {
        let user_id = Uuid::new_v4();
        self.users
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user_id));
        Session {
            user_id,
            email: Some(email.to_string()),
        }
    }

    /// Installs a session directly, bypassing the credential check.
    pub fn seed_session(&self, session: Session) {
        *self.session.lock().unwrap() = Some(session);
    }

    /// Inserts a row with an explicit timestamp, for deterministic ordering.
    pub fn seed_log(
        &self,
        user_id: Uuid,
        user_email: &str,
        plan: &str,
        achievement: &str,
        created_at: DateTime<Utc>,
    ) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.logs.lock().unwrap().push(LogEntry {
            id,
            user_id,
            user_email: user_email.to_string(),
            plan: plan.to_string(),
            achievement: achievement.to_string(),
            created_at,
            date: created_at.date_naive(),
        });
        id
    }

    pub fn log_count(&self) -> usize {
        self.logs.lock().unwrap().len()
    }

    fn notify(&self, user_id: Uuid) {
        let subscribers = self.subscribers.lock().unwrap();
        for (filter, tx) in subscribers.iter() {
            if filter.map_or(true, |f| f == user_id) {
                let _ = tx.try_send(());
            }
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let users = self.users.lock().unwrap();
        match users.get(email) {
            Some((stored, user_id)) if stored.as_str() == password => {
                let session = Session {
                    user_id: *user_id,
                    email: Some(email.to_string()),
                };
                drop(users);
                self.seed_session(session.clone());
                Ok(session)
            }
            _ => Err(AuthError::Rejected("Invalid login credentials".to_string())),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        if self.users.lock().unwrap().contains_key(email) {
            return Err(AuthError::Rejected("User already registered".to_string()));
        }
        let session = self.with_user(email, password);
        self.seed_session(session.clone());
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.session.lock().unwrap().take().is_none() {
            return Err(AuthError::NotSignedIn);
        }
        Ok(())
    }

    async fn get_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    async fn insert_log(&self, new: NewLogEntry) -> Result<LogEntry, StorageError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected(
                "permission denied for table logs".to_string(),
            ));
        }
        let id = self.seed_log(
            new.user_id,
            &new.user_email,
            &new.plan,
            &new.achievement,
            Utc::now(),
        );
        let entry = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .expect("row just inserted");
        self.notify(new.user_id);
        Ok(entry)
    }

    async fn query_logs(&self, query: LogQuery) -> Result<LogPage, StorageError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected(
                "permission denied for table logs".to_string(),
            ));
        }

        let mut rows: Vec<LogEntry> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| query.filter_user_id.map_or(true, |f| e.user_id == f))
            .cloned()
            .collect();
        // Newest first; id breaks timestamp ties the way a serial key would.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = rows.len() as u64;
        let from = query.offset as usize;
        let rows = match query.limit {
            Some(limit) if from < rows.len() => {
                let to = (from + limit as usize).min(rows.len());
                rows[from..to].to_vec()
            }
            Some(_) => Vec::new(),
            None => rows,
        };

        Ok(LogPage {
            rows,
            count: query.with_count.then_some(total),
        })
    }

    async fn subscribe_to_log_changes(
        &self,
        filter_user_id: Option<Uuid>,
    ) -> Result<ChangeSubscription, StorageError> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push((filter_user_id, tx));
        Ok(ChangeSubscription::new(rx, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_and_ranges() {
        let backend = MockBackend::new();
        let user = Uuid::new_v4();
        for h in 1..=5 {
            backend.seed_log(user, "a@tie.ust", "p", "a", ts(h));
        }

        let page = backend
            .query_logs(LogQuery {
                filter_user_id: None,
                offset: 0,
                limit: Some(2),
                with_count: true,
            })
            .await
            .unwrap();
        assert_eq!(page.count, Some(5));
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].created_at, ts(5));
        assert_eq!(page.rows[1].created_at, ts(4));
    }

    #[tokio::test]
    async fn test_query_filter_scopes_to_user() {
        let backend = MockBackend::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        backend.seed_log(alice, "alice@tie.ust", "p", "a", ts(1));
        backend.seed_log(bob, "bob@tie.ust", "p", "a", ts(2));

        let page = backend.query_logs(LogQuery::all_for_user(alice)).await.unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].user_id, alice);
    }

    #[tokio::test]
    async fn test_insert_query_round_trip_keeps_fields_and_server_date() {
        let backend = MockBackend::new();
        let alice = backend.with_user("alice@tie.ust", "pw");

        let inserted = backend
            .insert_log(NewLogEntry {
                user_id: alice.user_id,
                user_email: "alice@tie.ust".to_string(),
                plan: "P".to_string(),
                achievement: "A".to_string(),
            })
            .await
            .unwrap();

        let page = backend
            .query_logs(LogQuery::all_for_user(alice.user_id))
            .await
            .unwrap();
        let row = &page.rows[0];
        assert_eq!(row.plan, "P");
        assert_eq!(row.achievement, "A");
        assert_eq!(row.date, inserted.created_at.date_naive());
    }

    #[tokio::test]
    async fn test_insert_notifies_matching_subscriber() {
        let backend = MockBackend::new();
        let session = backend.with_user("alice@tie.ust", "pw");
        let mut sub = backend
            .subscribe_to_log_changes(Some(session.user_id))
            .await
            .unwrap();
        let mut other = backend
            .subscribe_to_log_changes(Some(Uuid::new_v4()))
            .await
            .unwrap();

        backend
            .insert_log(NewLogEntry {
                user_id: session.user_id,
                user_email: "alice@tie.ust".to_string(),
                plan: "P".to_string(),
                achievement: "A".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(sub.recv().await, Some(()));
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), other.recv())
            .await
            .is_err());
    }
}
