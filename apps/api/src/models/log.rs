use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One submitted daily-log record. Never updated or deleted by this
/// application; `created_at` (and therefore `date`) is assigned by the
/// storage service at insert time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    /// Denormalized copy of the submitter's email, kept for the admin table.
    #[serde(rename = "userEmail")]
    pub user_email: String,
    pub plan: String,
    pub achievement: String,
    pub created_at: DateTime<Utc>,
    /// Calendar-day portion of `created_at`.
    pub date: NaiveDate,
}

/// Insert payload, serialized with the storage service's column names.
#[derive(Debug, Clone, Serialize)]
pub struct NewLogEntry {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "userEmail")]
    pub user_email: String,
    pub plan: String,
    pub achievement: String,
}

/// An untyped row as the storage service returns it. Everything is optional
/// here; `decode` is the single place that decides what is required.
#[derive(Debug, Deserialize)]
pub struct RawLogRow {
    pub id: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
    #[serde(rename = "userEmail")]
    pub user_email: Option<String>,
    pub plan: Option<String>,
    pub achievement: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
#[error("malformed log row: missing {0}")]
pub struct MalformedRow(&'static str);

impl RawLogRow {
    /// Validates the row and produces the strongly-typed entry.
    ///
    /// Required: `id`, `userId`, `created_at`. A missing `userEmail` renders
    /// as "N/A" and missing text fields as empty, matching what the views
    /// display for legacy rows.
    pub fn decode(self) -> Result<LogEntry, MalformedRow> {
        let id = self.id.ok_or(MalformedRow("id"))?;
        let user_id = self.user_id.ok_or(MalformedRow("userId"))?;
        let created_at = self.created_at.ok_or(MalformedRow("created_at"))?;

        Ok(LogEntry {
            id,
            user_id,
            user_email: self.user_email.unwrap_or_else(|| "N/A".to_string()),
            plan: self.plan.unwrap_or_default(),
            achievement: self.achievement.unwrap_or_default(),
            created_at,
            date: created_at.date_naive(),
        })
    }
}

/// Decodes a batch of raw rows, logging and skipping malformed ones instead
/// of propagating untyped data inward.
pub fn decode_rows(raw: Vec<RawLogRow>) -> Vec<LogEntry> {
    raw.into_iter()
        .filter_map(|row| match row.decode() {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping {e}");
                None
            }
        })
        .collect()
}
