use std::collections::HashSet;

use anyhow::{Context, Result};

/// Defaults used when the environment leaves the credentials unset. While
/// either credential still holds its placeholder, the whole UI is replaced by
/// a configuration-error response and no feature is reachable.
pub const URL_PLACEHOLDER: &str = "YOUR_PROJECT_URL";
pub const KEY_PLACEHOLDER: &str = "YOUR_ANON_KEY";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Identities granted the admin role, lowercase.
    pub admin_emails: HashSet<String>,
    /// Identities permitted to register at all, lowercase.
    pub allowed_emails: HashSet<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            supabase_url: std::env::var("SUPABASE_URL")
                .unwrap_or_else(|_| URL_PLACEHOLDER.to_string()),
            supabase_anon_key: std::env::var("SUPABASE_ANON_KEY")
                .unwrap_or_else(|_| KEY_PLACEHOLDER.to_string()),
            admin_emails: parse_email_list(
                &std::env::var("ADMIN_EMAILS").unwrap_or_default(),
            ),
            allowed_emails: parse_email_list(
                &std::env::var("ALLOWED_EMAILS").unwrap_or_default(),
            ),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// True once both service credentials have been replaced with real values.
    pub fn is_configured(&self) -> bool {
        self.supabase_url != URL_PLACEHOLDER
            && !self.supabase_url.is_empty()
            && self.supabase_anon_key != KEY_PLACEHOLDER
            && !self.supabase_anon_key.is_empty()
    }
}

/// Parses a comma-separated email list into a lowercase set.
/// Membership checks are always case-insensitive.
pub fn parse_email_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(url: &str, key: &str) -> Config {
        Config {
            supabase_url: url.to_string(),
            supabase_anon_key: key.to_string(),
            admin_emails: HashSet::new(),
            allowed_emails: HashSet::new(),
            port: 8080,
            rust_log: "info".to_string(),
        }
    }

    #[test]
    fn test_placeholders_are_unconfigured() {
        assert!(!config_with(URL_PLACEHOLDER, KEY_PLACEHOLDER).is_configured());
        assert!(!config_with("https://abc.supabase.co", KEY_PLACEHOLDER).is_configured());
        assert!(!config_with(URL_PLACEHOLDER, "real-key").is_configured());
        assert!(!config_with("", "").is_configured());
    }

    #[test]
    fn test_real_credentials_are_configured() {
        assert!(config_with("https://abc.supabase.co", "anon-key").is_configured());
    }

    #[test]
    fn test_parse_email_list_trims_and_lowercases() {
        let set = parse_email_list(" Admin@Tie.ust , jac@tie.ust ,, ");
        assert_eq!(set.len(), 2);
        assert!(set.contains("admin@tie.ust"));
        assert!(set.contains("jac@tie.ust"));
    }

    #[test]
    fn test_parse_email_list_empty() {
        assert!(parse_email_list("").is_empty());
    }
}
