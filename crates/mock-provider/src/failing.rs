//! Completer that always fails.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use provider_core::{ChatCompleter, ChatMessage, ProviderError};

/// A completer whose every call fails with an upstream error.
#[derive(Debug, Default)]
pub struct FailingCompleter {
    calls: AtomicUsize,
}

impl FailingCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatCompleter for FailingCompleter {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Upstream {
            status: 503,
            message: "mock provider is down".to_string(),
        })
    }

    fn name(&self) -> &str {
        "FailingCompleter"
    }
}
