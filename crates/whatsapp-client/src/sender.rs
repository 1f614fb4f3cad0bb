//! Message sender trait and test implementations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::types::SendResult;

/// Trait for delivering text replies to end-users.
///
/// Abstracted to support different transports (WhatsApp Cloud API, tests, etc.)
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a text message.
    ///
    /// # Arguments
    /// * `phone_id` - Sending business phone-number identifier
    /// * `access_token` - Bearer token of the owning tenant
    /// * `to` - Recipient phone number
    /// * `body` - Message content
    async fn send_text(
        &self,
        phone_id: &str,
        access_token: &str,
        to: &str,
        body: &str,
    ) -> Result<SendResult, DeliveryError>;
}

/// A message captured by [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone_id: String,
    pub access_token: String,
    pub to: String,
    pub body: String,
}

/// A sender for testing that records every message and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(
        &self,
        phone_id: &str,
        access_token: &str,
        to: &str,
        body: &str,
    ) -> Result<SendResult, DeliveryError> {
        tracing::info!("[recording] Sending message to {}: {}", to, body);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                phone_id: phone_id.to_string(),
                access_token: access_token.to_string(),
                to: to.to_string(),
                body: body.to_string(),
            });
        }
        Ok(SendResult::default())
    }
}

/// A sender for testing whose every send fails with an API status.
#[derive(Debug)]
pub struct FailingSender {
    status: u16,
    attempts: AtomicUsize,
}

impl FailingSender {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of sends attempted so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for FailingSender {
    async fn send_text(
        &self,
        _phone_id: &str,
        _access_token: &str,
        _to: &str,
        _body: &str,
    ) -> Result<SendResult, DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Api {
            status: self.status,
            body: "simulated failure".to_string(),
        })
    }
}
