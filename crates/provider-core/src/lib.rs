//! Core traits and types for AI provider implementations.
//!
//! This crate provides the shared interface between the webhook gateway, the
//! reply workers, and concrete providers. It defines:
//!
//! - [`Embedder`] - text-to-vector embedding
//! - [`ChatCompleter`] - chat completion over an ordered message list
//! - [`ChatMessage`] - a single `{role, content}` turn
//! - [`ProviderSlot`] - explicit lazy initialization of a provider handle
//! - [`ProviderError`] - error types for provider calls
//!
//! # Example
//!
//! ```rust
//! use provider_core::{async_trait, ChatCompleter, ChatMessage, ProviderError};
//!
//! struct Parrot;
//!
//! #[async_trait]
//! impl ChatCompleter for Parrot {
//!     async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
//!         Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Parrot"
//!     }
//! }
//! ```

mod error;
mod message;
mod slot;
mod traits;

pub use error::ProviderError;
pub use message::ChatMessage;
pub use slot::ProviderSlot;
pub use traits::{ChatCompleter, Embedder};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
