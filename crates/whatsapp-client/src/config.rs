//! Configuration types for whatsapp-client.

use std::env;
use std::time::Duration;

/// Configuration for the Graph API endpoint.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Base URL of the Graph API (e.g., "https://graph.facebook.com").
    pub api_url: String,
    /// Graph API version without the leading `v` (e.g., "19.0").
    pub graph_version: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl WhatsAppConfig {
    /// Create a configuration with the given base URL and default version.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `WHATSAPP_API_URL` | Graph API base URL | `https://graph.facebook.com` |
    /// | `FB_GRAPH_VERSION` | Graph API version | `19.0` |
    /// | `WHATSAPP_TIMEOUT_SECS` | Request timeout | `30` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env::var("WHATSAPP_API_URL").unwrap_or(defaults.api_url),
            graph_version: env::var("FB_GRAPH_VERSION").unwrap_or(defaults.graph_version),
            timeout: env::var("WHATSAPP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Set the Graph API version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.graph_version = version.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the messages endpoint URL for a phone-number identifier.
    pub fn messages_url(&self, phone_id: &str) -> String {
        let version = self.graph_version.trim_start_matches('v');
        format!(
            "{}/v{}/{}/messages",
            self.api_url.trim_end_matches('/'),
            version,
            phone_id
        )
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_url: "https://graph.facebook.com".to_string(),
            graph_version: "19.0".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}
