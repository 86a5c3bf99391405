use std::collections::HashSet;

use crate::config::Config;
use crate::models::session::Session;

/// Static allow-list policy. Role is derived, never stored: every read
/// recomputes it from the current session's email, so a role can never
/// outlive the identity it was derived from.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_emails: HashSet<String>,
    allowed_emails: HashSet<String>,
}

impl AccessPolicy {
    pub fn from_config(config: &Config) -> Self {
        AccessPolicy {
            admin_emails: config.admin_emails.clone(),
            allowed_emails: config.allowed_emails.clone(),
        }
    }

    #[cfg(test)]
    pub fn new(admin_emails: &[&str], allowed_emails: &[&str]) -> Self {
        AccessPolicy {
            admin_emails: admin_emails.iter().map(|e| e.to_lowercase()).collect(),
            allowed_emails: allowed_emails.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// True iff the identity's email is on the admin allow-list.
    pub fn is_admin(&self, session: &Session) -> bool {
        session
            .email
            .as_deref()
            .is_some_and(|email| self.admin_emails.contains(&email.to_lowercase()))
    }

    /// Sign-up gate, checked before any request leaves the process.
    pub fn may_register(&self, email: &str) -> bool {
        self.allowed_emails.contains(&email.to_lowercase())
    }
}
