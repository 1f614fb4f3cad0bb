//! Configuration for OpenAiClient.

use std::env;
use std::time::Duration;

use provider_core::ProviderError;

/// Default request timeout. Kept well below the worker's soft time limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for OpenAiClient.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL.
    pub api_url: String,

    /// API key for authentication.
    pub api_key: String,

    /// Chat-completion model name.
    pub model: String,

    /// Embedding model name.
    pub embedding_model: String,

    /// Embedding dimensionality. Fixed for the lifetime of a deployment.
    pub embedding_dimensions: usize,

    /// Maximum tokens for completions.
    pub max_tokens: Option<u32>,

    /// Temperature for generation (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            max_tokens: Some(500),
            temperature: Some(0.7),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl OpenAiConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OPENAI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `OPENAI_API_URL` - API URL (default: https://api.openai.com)
    /// - `OPENAI_MODEL` - Completion model (default: gpt-4o)
    /// - `OPENAI_EMBEDDING_MODEL` - Embedding model (default: text-embedding-3-small)
    /// - `EMBEDDING_DIMENSIONS` - Embedding size (default: 1536)
    /// - `OPENAI_MAX_TOKENS` - Max tokens (default: 500)
    /// - `OPENAI_TEMPERATURE` - Temperature (default: 0.7)
    /// - `PROVIDER_TIMEOUT_SECS` - Per-request timeout (default: 60)
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::Configuration("OPENAI_API_KEY not set".to_string()))?;

        let defaults = Self::default();

        let api_url = env::var("OPENAI_API_URL").unwrap_or(defaults.api_url);
        let model = env::var("OPENAI_MODEL").unwrap_or(defaults.model);
        let embedding_model =
            env::var("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model);

        let embedding_dimensions = embedding_dimensions_from_env();

        let max_tokens = env::var("OPENAI_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.max_tokens);

        let temperature = env::var("OPENAI_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.temperature);

        let timeout = env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Ok(Self {
            api_url,
            api_key,
            model,
            embedding_model,
            embedding_dimensions,
            max_tokens,
            temperature,
            timeout,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> OpenAiConfigBuilder {
        OpenAiConfigBuilder::default()
    }
}

/// Embedding dimensionality from `EMBEDDING_DIMENSIONS` (default: 1536).
///
/// Shared with callers that validate stored vectors without building a client.
pub fn embedding_dimensions_from_env() -> usize {
    env::var("EMBEDDING_DIMENSIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|d: &usize| *d > 0)
        .unwrap_or(1536)
}

/// Builder for OpenAiConfig.
#[derive(Debug, Default)]
pub struct OpenAiConfigBuilder {
    config: OpenAiConfig,
}

impl OpenAiConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the completion model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the embedding model and its dimensionality.
    pub fn embedding_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.config.embedding_model = model.into();
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenAiConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAiConfig::default();

        assert_eq!(config.api_url, "https://api.openai.com");
        assert!(config.api_key.is_empty());
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.embedding_dimensions, 1536);
        assert_eq!(config.max_tokens, Some(500));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_builder_all_options() {
        let config = OpenAiConfig::builder()
            .api_key("my-key")
            .api_url("http://localhost:9000")
            .model("gpt-4o-mini")
            .embedding_model("text-embedding-3-large", 3072)
            .max_tokens(256)
            .temperature(0.2)
            .timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.api_key, "my-key");
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.embedding_model, "text-embedding-3-large");
        assert_eq!(config.embedding_dimensions, 3072);
        assert_eq!(config.max_tokens, Some(256));
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    // Environment-based tests are combined into a single test to avoid
    // race conditions when tests run in parallel (env vars are process-global).
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        fn clear_all_vars() {
            for var in [
                "OPENAI_API_KEY",
                "OPENAI_API_URL",
                "OPENAI_MODEL",
                "OPENAI_EMBEDDING_MODEL",
                "EMBEDDING_DIMENSIONS",
                "OPENAI_MAX_TOKENS",
                "OPENAI_TEMPERATURE",
                "PROVIDER_TIMEOUT_SECS",
            ] {
                std::env::remove_var(var);
            }
        }

        // Missing API key is a configuration error
        clear_all_vars();
        match OpenAiConfig::from_env() {
            Err(ProviderError::Configuration(msg)) => assert!(msg.contains("OPENAI_API_KEY")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }

        // Blank key counts as missing
        std::env::set_var("OPENAI_API_KEY", "  ");
        assert!(OpenAiConfig::from_env().is_err());

        // Defaults
        clear_all_vars();
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let config = OpenAiConfig::from_env().unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.embedding_dimensions, 1536);

        // Overrides
        std::env::set_var("OPENAI_MODEL", "gpt-4o-mini");
        std::env::set_var("EMBEDDING_DIMENSIONS", "384");
        std::env::set_var("PROVIDER_TIMEOUT_SECS", "10");
        let config = OpenAiConfig::from_env().unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.embedding_dimensions, 384);
        assert_eq!(config.timeout, Duration::from_secs(10));

        clear_all_vars();
    }
}
