//! Provider trait definitions.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::message::ChatMessage;

/// Turns text into a fixed-length vector.
///
/// This trait is object-safe and can be used as `Arc<dyn Embedder>`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`.
    ///
    /// Returns `Ok(None)` for blank input. Errors are reserved for failed or
    /// misconfigured provider calls.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError>;

    /// Output dimensionality.
    fn dimensions(&self) -> usize;

    /// Get a human-readable name for this provider.
    fn name(&self) -> &str;
}

/// Generates a reply for an ordered conversation.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Complete the conversation. `messages` usually starts with a system turn.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Get a human-readable name for this provider.
    fn name(&self) -> &str;
}
