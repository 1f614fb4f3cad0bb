//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

use database::task::DEFAULT_MAX_ATTEMPTS;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Secret for the webhook verification handshake.
    pub verify_token: Option<String>,
    /// Token required by the admin API.
    pub admin_token: Option<String>,
    /// Stored messages included in a reply context.
    pub history_window: i64,
    /// FAQ entries retrieved per RAG query.
    pub rag_top_k: usize,
    /// Attempts allowed for each queued task.
    pub max_attempts: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: "sqlite:whatsapp_bot.db?mode=rwc".to_string(),
            verify_token: None,
            admin_token: None,
            history_window: rag::DEFAULT_HISTORY_WINDOW,
            rag_top_k: rag::DEFAULT_TOP_K,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GATEWAY_ADDR` | Server bind address | `0.0.0.0:8000` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:whatsapp_bot.db?mode=rwc` |
    /// | `VERIFY_TOKEN` | Webhook verification secret | (unset) |
    /// | `ADMIN_API_TOKEN` | Admin API token | (unset) |
    /// | `HISTORY_WINDOW` | Messages per reply context | `10` |
    /// | `RAG_TOP_K` | FAQ entries per RAG query | `3` |
    /// | `WORKER_MAX_RETRIES` | Retries per queued task | `3` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let addr = match non_empty("GATEWAY_ADDR") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidAddr(raw))?,
            None => defaults.addr,
        };

        let database_url = non_empty("DATABASE_URL").unwrap_or(defaults.database_url);

        let history_window = match non_empty("HISTORY_WINDOW") {
            Some(raw) => raw
                .parse()
                .ok()
                .filter(|n: &i64| *n >= 0)
                .ok_or(ConfigError::InvalidNumber("HISTORY_WINDOW", raw))?,
            None => defaults.history_window,
        };

        let rag_top_k = match non_empty("RAG_TOP_K") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("RAG_TOP_K", raw))?,
            None => defaults.rag_top_k,
        };

        let max_attempts = match non_empty("WORKER_MAX_RETRIES") {
            Some(raw) => raw
                .parse::<u32>()
                .map(|retries| i64::from(retries) + 1)
                .map_err(|_| ConfigError::InvalidNumber("WORKER_MAX_RETRIES", raw))?,
            None => defaults.max_attempts,
        };

        Ok(Self {
            addr,
            database_url,
            verify_token: non_empty("VERIFY_TOKEN"),
            admin_token: non_empty("ADMIN_API_TOKEN"),
            history_window,
            rag_top_k,
            max_attempts,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid GATEWAY_ADDR: {0}")]
    InvalidAddr(String),

    #[error("Invalid {0}: {1}")]
    InvalidNumber(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 7] = [
        "GATEWAY_ADDR",
        "DATABASE_URL",
        "VERIFY_TOKEN",
        "ADMIN_API_TOKEN",
        "HISTORY_WINDOW",
        "RAG_TOP_K",
        "WORKER_MAX_RETRIES",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();

        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.addr.port(), 8000);
        assert_eq!(config.history_window, 10);
        assert_eq!(config.rag_top_k, 3);
        assert_eq!(config.max_attempts, 4);
        assert!(config.verify_token.is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_overrides_and_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();

        env::set_var("VERIFY_TOKEN", "hub-secret");
        env::set_var("ADMIN_API_TOKEN", "  ");
        env::set_var("WORKER_MAX_RETRIES", "1");
        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.verify_token.as_deref(), Some("hub-secret"));
        assert!(config.admin_token.is_none());
        assert_eq!(config.max_attempts, 2);

        env::set_var("GATEWAY_ADDR", "not-an-addr");
        assert!(matches!(GatewayConfig::from_env(), Err(ConfigError::InvalidAddr(_))));

        clear();
        env::set_var("HISTORY_WINDOW", "-1");
        assert!(matches!(
            GatewayConfig::from_env(),
            Err(ConfigError::InvalidNumber("HISTORY_WINDOW", _))
        ));

        clear();
    }
}
