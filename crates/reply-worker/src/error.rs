//! Error types for job execution.

use std::time::Duration;

use database::DatabaseError;
use provider_core::ProviderError;
use thiserror::Error;
use whatsapp_client::DeliveryError;

/// Errors from running a queued job.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Completion or embedding provider failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// WhatsApp rejected or never received the reply.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// Storage error.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The task payload could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No handler for the task kind.
    #[error("unknown task kind: {0}")]
    UnknownKind(String),

    /// The attempt ran past the soft time limit.
    #[error("soft time limit of {0:?} exceeded")]
    TimedOut(Duration),

    /// Invalid worker configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl WorkerError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::InvalidPayload(_) | WorkerError::UnknownKind(_) | WorkerError::Config(_) => {
                false
            }
            // The tenant was deleted after the job was queued.
            WorkerError::Database(e) => !e.is_not_found(),
            _ => true,
        }
    }

    /// Whether the failure happened while delivering the reply.
    pub fn is_delivery(&self) -> bool {
        matches!(self, WorkerError::Delivery(_))
    }
}
