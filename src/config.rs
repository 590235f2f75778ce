//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

/// Default assistant service address.
pub const DEFAULT_ASSISTANT_URL: &str = "http://127.0.0.1:8385";

/// Default number of unread items requested per structured query.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Assistant service configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL of the assistant service (no trailing slash).
    pub base_url: String,
    /// Transport-level timeout per request.
    pub timeout: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ASSISTANT_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl AssistantConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("MAIL_TRIAGE_ASSISTANT_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let timeout = std::env::var("MAIL_TRIAGE_ASSISTANT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self { base_url, timeout }
    }
}

/// Retrieval chain configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Page size for the structured query and the legacy fetch.
    pub page_size: usize,
    /// When every live channel fails, return an empty degraded result
    /// instead of a hard failure.
    pub degrade_on_exhaustion: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            degrade_on_exhaustion: true,
        }
    }
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let page_size = std::env::var("MAIL_TRIAGE_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.page_size);

        let degrade_on_exhaustion = std::env::var("MAIL_TRIAGE_DEGRADE_ON_EXHAUSTION")
            .ok()
            .map(|s| !matches!(s.trim().to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(defaults.degrade_on_exhaustion);

        Self {
            page_size,
            degrade_on_exhaustion,
        }
    }
}

/// Mailbox host configuration for the HTTP host adapter.
///
/// The default has no endpoints, which yields a host without a live mailbox.
#[derive(Debug, Clone, Default)]
pub struct MailboxConfig {
    /// Base URL of the structured REST API (e.g. `https://outlook.office.com/api`).
    pub rest_url: Option<String>,
    /// Legacy XML (EWS) endpoint.
    pub ews_url: Option<String>,
    /// Pre-issued access token. Token issuance itself is external.
    pub access_token: Option<SecretString>,
}

impl MailboxConfig {
    /// Build config from environment variables.
    /// Returns `None` if neither `MAILBOX_REST_URL` nor `MAILBOX_EWS_URL` is set.
    pub fn from_env() -> Option<Self> {
        let rest_url = non_empty_var("MAILBOX_REST_URL").map(|s| s.trim_end_matches('/').to_string());
        let ews_url = non_empty_var("MAILBOX_EWS_URL");

        if rest_url.is_none() && ews_url.is_none() {
            return None;
        }

        let access_token = non_empty_var("MAILBOX_ACCESS_TOKEN").map(SecretString::from);

        Some(Self {
            rest_url,
            ews_url,
            access_token,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_defaults_point_at_local_service() {
        let config = AssistantConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8385");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn retrieval_defaults_degrade() {
        let config = RetrievalConfig::default();
        assert_eq!(config.page_size, 50);
        assert!(config.degrade_on_exhaustion);
    }

    #[test]
    fn mailbox_config_none_without_urls() {
        // SAFETY: No other test reads these variables.
        unsafe {
            std::env::remove_var("MAILBOX_REST_URL");
            std::env::remove_var("MAILBOX_EWS_URL");
        }
        assert!(MailboxConfig::from_env().is_none());
    }
}
