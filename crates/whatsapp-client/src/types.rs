//! Wire types for the messages endpoint.

use serde::{Deserialize, Serialize};

/// Body of a text-message send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessageRequest<'a> {
    pub messaging_product: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: TextBody<'a>,
}

/// Text payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextBody<'a> {
    pub body: &'a str,
}

impl<'a> TextMessageRequest<'a> {
    /// Build a plain text message to `to`.
    pub fn new(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        }
    }
}

/// Successful send response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessageId>,
}

/// Identifier assigned to an accepted message.
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessageId {
    pub id: String,
}

/// Result of a delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendResult {
    /// WhatsApp message id of the sent reply, when the API returned one.
    pub message_id: Option<String>,
}
