//! Rust client for the WhatsApp Business Cloud API.
//!
//! Only outbound text messages are supported: one authenticated POST per reply
//! to `/{version}/{phone_id}/messages`. Any non-2xx answer is a
//! [`DeliveryError`], which callers treat as retryable.
//!
//! # Example
//!
//! ```rust,no_run
//! use whatsapp_client::{MessageSender, WhatsAppClient, WhatsAppConfig};
//!
//! # async fn example() -> Result<(), whatsapp_client::DeliveryError> {
//! let client = WhatsAppClient::new(WhatsAppConfig::default())?;
//! client
//!     .send_text("1234567890", "EAAG...", "+15550001", "Hello from the bot")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod sender;
pub mod types;

pub use client::WhatsAppClient;
pub use config::WhatsAppConfig;
pub use error::DeliveryError;
pub use sender::{FailingSender, MessageSender, RecordingSender, SentMessage};
pub use types::{SendResult, TextMessageRequest};
