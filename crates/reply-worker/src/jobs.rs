//! Job payloads carried by queued tasks.

use provider_core::ChatMessage;
use serde::{Deserialize, Serialize};

/// Task kind for [`ReplyJob`].
pub const REPLY_KIND: &str = "reply";

/// Task kind for [`FaqImportJob`].
pub const FAQ_IMPORT_KIND: &str = "faq_import";

/// Generate and deliver one assistant reply.
///
/// Tenant routing data is captured when the job is enqueued; the worker does not
/// re-read the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyJob {
    pub tenant_id: String,
    pub phone_id: String,
    pub wh_token: String,
    pub system_prompt: String,
    /// Completion context, system prompt first.
    pub context: Vec<ChatMessage>,
    /// End-user phone number.
    pub recipient: String,
    /// Id of the inbound message that triggered the reply.
    pub message_id: i64,
}

impl ReplyJob {
    /// The conversation handed to the completion provider.
    ///
    /// A context captured without a leading system turn gets the captured system
    /// prompt prepended.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        match self.context.first() {
            Some(first) if first.role == "system" => self.context.clone(),
            _ => {
                let mut conversation = Vec::with_capacity(self.context.len() + 1);
                conversation.push(ChatMessage::system(self.system_prompt.clone()));
                conversation.extend(self.context.iter().cloned());
                conversation
            }
        }
    }
}

/// One FAQ entry to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqImportItem {
    pub question: String,
    pub answer: String,
}

/// Embed and store a batch of FAQ entries for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqImportJob {
    pub tenant_id: String,
    pub items: Vec<FaqImportItem>,
}

/// Why a single import item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqImportFailure {
    /// Question text, shortened for display.
    pub question: String,
    pub error: String,
}

/// Outcome of a [`FaqImportJob`], stored as the task result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqImportReport {
    pub tenant_id: String,
    pub total_items: usize,
    pub successful_items: usize,
    pub failed_items: usize,
    pub errors: Vec<FaqImportFailure>,
}

impl FaqImportReport {
    pub fn new(tenant_id: impl Into<String>, total_items: usize) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            total_items,
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, question: &str, error: impl Into<String>) {
        self.failed_items += 1;
        self.errors.push(FaqImportFailure {
            question: preview(question),
            error: error.into(),
        });
    }
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 50;
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(MAX_CHARS).collect();
    short.push_str("...");
    short
}
