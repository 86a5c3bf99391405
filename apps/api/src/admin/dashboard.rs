//! Admin dashboard state machine: one fetched page of all users' logs,
//! pagination over an exact count, an optional per-user filter, and at most
//! one expanded row.

use serde::Serialize;
use uuid::Uuid;

use crate::models::log::LogEntry;

pub const LOGS_PER_PAGE: u32 = 10;

/// How many characters of a text cell survive in the collapsed row preview.
pub const PREVIEW_CHARS: usize = 64;

/// How many rows the one-off owner scan reads when building the filter
/// dropdown. Owners beyond this appear only after a dashboard reset.
pub const OWNER_SCAN_LIMIT: u32 = 1000;

/// Inclusive item range for a 1-based page: `[(page-1)*10, page*10 - 1]`.
pub fn page_range(page: u32) -> (u32, u32) {
    let from = (page.saturating_sub(1)) * LOGS_PER_PAGE;
    (from, from + LOGS_PER_PAGE - 1)
}

pub fn total_pages(count: u64) -> u32 {
    count.div_ceil(LOGS_PER_PAGE as u64) as u32
}

/// Collapsed-cell preview: first line only, cut on a char boundary.
pub fn truncate_preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    let mut preview: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if preview.len() < first_line.len() || text.lines().count() > 1 {
        preview.push('…');
    }
    preview
}

/// One entry of the filter dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogOwner {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "userEmail")]
    pub user_email: String,
}

/// Each distinct `user_id` exactly once, sorted by `user_email`.
pub fn distinct_owners(rows: &[LogEntry]) -> Vec<LogOwner> {
    let mut owners: Vec<LogOwner> = Vec::new();
    for row in rows {
        if !owners.iter().any(|o| o.user_id == row.user_id) {
            owners.push(LogOwner {
                user_id: row.user_id,
                user_email: row.user_email.clone(),
            });
        }
    }
    owners.sort_by(|a, b| a.user_email.cmp(&b.user_email));
    owners
}

#[derive(Debug)]
pub struct DashboardState {
    /// Set once the first page and the owner dropdown have been loaded.
    pub initialized: bool,
    pub page: u32,
    pub total_pages: u32,
    pub filter: Option<Uuid>,
    pub expanded_row: Option<i64>,
    pub rows: Vec<LogEntry>,
    pub owners: Vec<LogOwner>,
}

impl Default for DashboardState {
    fn default() -> Self {
        DashboardState {
            initialized: false,
            page: 1,
            total_pages: 0,
            filter: None,
            expanded_row: None,
            rows: Vec::new(),
            owners: Vec::new(),
        }
    }
}

impl DashboardState {
    pub fn reset(&mut self) {
        *self = DashboardState::default();
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.total_pages != 0 && self.page < self.total_pages
    }

    /// Advances one page unless already at the boundary. Returns whether the
    /// page changed (and therefore needs a re-fetch).
    pub fn next_page(&mut self) -> bool {
        if self.has_next() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.has_prev() {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Changing the filter always lands back on page 1 with nothing expanded.
    pub fn set_filter(&mut self, filter: Option<Uuid>) {
        self.filter = filter;
        self.page = 1;
        self.expanded_row = None;
    }

    /// One row expanded at a time: clicking the open row collapses it,
    /// clicking another moves the expansion there.
    pub fn toggle_row(&mut self, id: i64) {
        self.expanded_row = if self.expanded_row == Some(id) {
            None
        } else {
            Some(id)
        };
    }
}
