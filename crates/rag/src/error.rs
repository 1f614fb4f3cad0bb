//! Error types for retrieval and answering.

use database::DatabaseError;
use provider_core::ProviderError;
use thiserror::Error;

/// Errors from the RAG pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Tenant does not exist.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// A provider is not initialized or misconfigured.
    #[error("provider unavailable: {0}")]
    Unavailable(ProviderError),

    /// A provider call failed.
    #[error("upstream provider failed: {0}")]
    Upstream(ProviderError),

    /// Storage error.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ProviderError> for RagError {
    fn from(e: ProviderError) -> Self {
        if e.is_configuration() {
            RagError::Unavailable(e)
        } else {
            RagError::Upstream(e)
        }
    }
}
