//! Daily-log submission: validation, the advisory double-submit lock, and
//! the transient saved-confirmation status.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::Backend;
use crate::errors::AppError;
use crate::models::log::{LogEntry, NewLogEntry};
use crate::models::session::Session;

pub const VALIDATION_MESSAGE: &str =
    "Please fill out both what you did today and your plan for tomorrow.";
pub const SUCCESS_MESSAGE: &str = "Log saved successfully!";
pub const IN_FLIGHT_MESSAGE: &str = "A submission is already in progress.";

/// How long the saved confirmation stays visible.
pub const SUCCESS_CLEAR_DELAY: Duration = Duration::from_secs(3);

#[derive(Default)]
struct FormInner {
    submitting: AtomicBool,
    message: Mutex<Option<String>>,
    /// Bumped on every status change so a pending timed clear can tell
    /// whether it is still the latest one.
    message_seq: AtomicU64,
}

/// Shared submission status: the in-flight flag and the transient message.
#[derive(Clone, Default)]
pub struct FormStatus {
    inner: Arc<FormInner>,
}

/// Releases the in-flight flag when the request resolves either way.
pub struct SubmitGuard {
    inner: Arc<FormInner>,
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.inner.submitting.store(false, Ordering::SeqCst);
    }
}

impl FormStatus {
    pub fn new() -> Self {
        FormStatus::default()
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.load(Ordering::SeqCst)
    }

    pub fn message(&self) -> Option<String> {
        self.inner.message.lock().unwrap().clone()
    }

    /// Claims the in-flight lock; `None` while another submit is running.
    /// The lock is advisory only, there is no server-side idempotency key.
    pub fn try_begin(&self) -> Option<SubmitGuard> {
        if self.inner.submitting.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(SubmitGuard {
            inner: self.inner.clone(),
        })
    }

    /// Shows the saved confirmation and schedules its clear. A newer status
    /// supersedes the pending clear.
    fn set_transient_success(&self) {
        let seq = self.inner.message_seq.fetch_add(1, Ordering::SeqCst) + 1;
        *self.inner.message.lock().unwrap() = Some(SUCCESS_MESSAGE.to_string());

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SUCCESS_CLEAR_DELAY).await;
            if inner.message_seq.load(Ordering::SeqCst) == seq {
                *inner.message.lock().unwrap() = None;
            }
        });
    }
}

/// Validates and submits one daily log for the signed-in identity.
///
/// Both fields are required after trimming; a blank field surfaces the
/// validation message and no request is issued. On success the inserted
/// entry comes back (the caller clears its fields only then); on failure
/// the storage service's message passes through verbatim and the caller
/// keeps its field contents for resubmission.
pub async fn submit_log(
    status: &FormStatus,
    backend: &dyn Backend,
    session: &Session,
    plan: &str,
    achievement: &str,
) -> Result<LogEntry, AppError> {
    let plan = plan.trim();
    let achievement = achievement.trim();
    if plan.is_empty() || achievement.is_empty() {
        return Err(AppError::Validation(VALIDATION_MESSAGE.to_string()));
    }

    let _guard = status
        .try_begin()
        .ok_or_else(|| AppError::Validation(IN_FLIGHT_MESSAGE.to_string()))?;

    let entry = backend
        .insert_log(NewLogEntry {
            user_id: session.user_id,
            user_email: session.email_label().to_string(),
            plan: plan.to_string(),
            achievement: achievement.to_string(),
        })
        .await?;

    status.set_transient_success();
    Ok(entry)
}
