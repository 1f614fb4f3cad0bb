//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::vector::decode_embedding;

/// Default persona used when a tenant does not provide one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// One WhatsApp Business integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    /// Administrator-assigned identifier.
    pub id: String,
    /// WhatsApp phone-number identifier (globally unique).
    pub phone_id: String,
    /// WhatsApp access token used for outbound sends.
    pub wh_token: String,
    /// Persona/instructions placed at the head of every conversation.
    pub system_prompt: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl Tenant {
    /// The system prompt, falling back to the default when blank.
    pub fn effective_system_prompt(&self) -> &str {
        if self.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            &self.system_prompt
        }
    }
}

/// Fields for creating a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTenant {
    pub id: String,
    pub phone_id: String,
    pub wh_token: String,
    /// Defaults to [`DEFAULT_SYSTEM_PROMPT`] when omitted.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Partial tenant update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantUpdate {
    #[serde(default)]
    pub phone_id: Option<String>,
    #[serde(default)]
    pub wh_token: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One persisted conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    /// Auto-incrementing ID; defines per-tenant chronological order.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: String,
    /// External WhatsApp message id (inbound messages only).
    pub wa_msg_id: Option<String>,
    /// Who wrote the turn.
    pub role: MessageRole,
    /// End-user phone number the turn was exchanged with.
    pub contact: Option<String>,
    /// Message body.
    pub text: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// Fields for inserting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub tenant_id: String,
    pub wa_msg_id: Option<String>,
    pub role: MessageRole,
    pub contact: Option<String>,
    pub text: String,
}

impl NewMessage {
    /// An inbound end-user message.
    pub fn inbound(
        tenant_id: impl Into<String>,
        wa_msg_id: impl Into<String>,
        contact: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            wa_msg_id: Some(wa_msg_id.into()),
            role: MessageRole::User,
            contact: Some(contact.into()),
            text: text.into(),
        }
    }

    /// A generated assistant reply.
    pub fn assistant(
        tenant_id: impl Into<String>,
        contact: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            wa_msg_id: None,
            role: MessageRole::Assistant,
            contact: Some(contact.into()),
            text: text.into(),
        }
    }
}

/// Outcome of an idempotent message insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written.
    Inserted(Message),
    /// A message with the same external id is already stored.
    AlreadyExists,
}

/// A tenant-scoped knowledge base entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub id: i64,
    pub tenant_id: String,
    pub question: String,
    pub answer: String,
    /// `None` entries are excluded from retrieval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

impl Faq {
    /// Whether the entry participates in retrieval.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Raw FAQ row with the embedding still encoded.
#[derive(Debug, FromRow)]
pub(crate) struct FaqRow {
    pub id: i64,
    pub tenant_id: String,
    pub question: String,
    pub answer: String,
    pub embedding: Option<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<FaqRow> for Faq {
    fn from(row: FaqRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            question: row.question,
            answer: row.answer,
            embedding: row.embedding.as_deref().and_then(decode_embedding),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A retrieval hit with its cosine distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqMatch {
    pub id: i64,
    pub question: String,
    pub answer: String,
    /// `1 - cosine_similarity`; lower is closer.
    pub distance: f32,
}
