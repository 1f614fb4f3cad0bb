//! Echo completer - replies with the latest user turn.

use std::sync::Mutex;

use async_trait::async_trait;
use provider_core::{ChatCompleter, ChatMessage, ProviderError};

/// A completer that echoes the last user message back.
///
/// Every call's input is recorded so tests can inspect the context that reached
/// the provider.
#[derive(Debug, Default)]
pub struct EchoCompleter {
    prefix: Option<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl EchoCompleter {
    /// Create a new EchoCompleter with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoCompleter with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Conversations received so far.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatCompleter for EchoCompleter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        Ok(match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, last_user),
            None => last_user.to_string(),
        })
    }

    fn name(&self) -> &str {
        "EchoCompleter"
    }
}
