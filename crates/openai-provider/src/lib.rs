//! OpenAI-compatible provider implementation.
//!
//! [`OpenAiClient`] implements both [`Embedder`] and [`ChatCompleter`] over the
//! `/v1/embeddings` and `/v1/chat/completions` endpoints. Any server speaking the
//! same wire format can be targeted through `OPENAI_API_URL`.
//!
//! Clients are normally obtained through a [`ProviderSlot`], so a missing API key
//! only fails the calls that need the provider:
//!
//! ```rust,no_run
//! use openai_provider::embedder_slot;
//!
//! #[tokio::main]
//! async fn main() {
//!     let embedder = embedder_slot();
//!     match embedder.get().await {
//!         Ok(embedder) => println!("using {}", embedder.name()),
//!         Err(e) => eprintln!("embedding unavailable: {e}"),
//!     }
//! }
//! ```

mod api_types;
mod client;
mod config;
mod telemetry;

use std::sync::Arc;

pub use client::OpenAiClient;
pub use config::{embedding_dimensions_from_env, OpenAiConfig, OpenAiConfigBuilder};

pub use provider_core::{ChatCompleter, Embedder, ProviderError, ProviderSlot};

/// A slot that builds an embedding client from the environment on first use.
pub fn embedder_slot() -> ProviderSlot<dyn Embedder> {
    ProviderSlot::lazy("embedding", || {
        let client = OpenAiClient::from_env()?;
        Ok(Arc::new(client) as Arc<dyn Embedder>)
    })
}

/// A slot that builds a chat-completion client from the environment on first use.
pub fn completer_slot() -> ProviderSlot<dyn ChatCompleter> {
    ProviderSlot::lazy("completion", || {
        let client = OpenAiClient::from_env()?;
        Ok(Arc::new(client) as Arc<dyn ChatCompleter>)
    })
}
