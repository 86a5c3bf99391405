use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current authenticated identity. Exactly one session value is active in
/// the process at a time; it is owned by the session store and handed to
/// everything else read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl Session {
    /// Display label for the header; identities without an email render blank.
    pub fn email_label(&self) -> &str {
        self.email.as_deref().unwrap_or("")
    }
}
