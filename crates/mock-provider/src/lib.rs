//! Mock provider implementations for testing.
//!
//! This crate provides deterministic implementations of the provider traits:
//! - `HashedEmbedder` - bag-of-words hashing embedder, no network
//! - `EchoCompleter` - replies with the last user turn
//! - `FailingCompleter` - always fails, counting calls
//! - `DelayedCompleter` - wraps another completer with artificial delay
//!
//! For production use, see the `openai-provider` crate.
//!
//! # Example
//!
//! ```rust
//! use mock_provider::{ChatCompleter, ChatMessage, EchoCompleter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_provider::ProviderError> {
//!     let completer = EchoCompleter::with_prefix("Echo: ");
//!     let reply = completer
//!         .complete(&[ChatMessage::system("Be kind."), ChatMessage::user("Hi")])
//!         .await?;
//!     assert_eq!(reply, "Echo: Hi");
//!     Ok(())
//! }
//! ```

mod delayed;
mod echo;
mod failing;
mod hashed;

pub use provider_core::{async_trait, ChatCompleter, ChatMessage, Embedder, ProviderError};

pub use delayed::DelayedCompleter;
pub use echo::EchoCompleter;
pub use failing::FailingCompleter;
pub use hashed::HashedEmbedder;
