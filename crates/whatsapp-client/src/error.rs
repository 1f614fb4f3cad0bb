//! Error types for whatsapp-client.

use thiserror::Error;

/// Errors that can occur when delivering a message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("WhatsApp API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DeliveryError {
    /// HTTP status returned by the API, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Api { status, .. } => Some(*status),
            DeliveryError::Http(e) => e.status().map(|s| s.as_u16()),
            DeliveryError::Config(_) => None,
        }
    }
}
