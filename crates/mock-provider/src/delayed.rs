//! Delayed completer - wraps another completer with artificial delay.

use std::time::Duration;

use async_trait::async_trait;
use provider_core::{ChatCompleter, ChatMessage, ProviderError};
use tokio::time::sleep;

/// A completer that wraps another completer and adds artificial delay.
///
/// Useful for testing timeout handling and simulating provider latency.
pub struct DelayedCompleter<C: ChatCompleter> {
    inner: C,
    delay: Duration,
}

impl<C: ChatCompleter> DelayedCompleter<C> {
    /// Create a new DelayedCompleter wrapping `inner` with the specified delay.
    pub fn new(inner: C, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a completer with a delay in milliseconds.
    pub fn with_millis(inner: C, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }
}

#[async_trait]
impl<C: ChatCompleter> ChatCompleter for DelayedCompleter<C> {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        sleep(self.delay).await;
        self.inner.complete(messages).await
    }

    fn name(&self) -> &str {
        "DelayedCompleter"
    }
}
