//! Error types for provider calls.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when calling an AI provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing or invalid configuration (e.g. no API key).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The provider answered with something we could not use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider is not initialized.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether the error comes from setup rather than from a call.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderError::Configuration(_) | ProviderError::Unavailable(_))
    }
}
