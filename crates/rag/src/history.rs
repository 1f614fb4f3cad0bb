//! Chat history assembly.

use database::{message, tenant, Message, MessageRole, Result, SqliteExecutor, SqlitePool, Tenant};
use provider_core::ChatMessage;

/// Number of stored messages included after the system prompt.
pub const DEFAULT_HISTORY_WINDOW: i64 = 10;

fn to_chat_message(message: Message) -> ChatMessage {
    match message.role {
        MessageRole::User => ChatMessage::user(message.text),
        MessageRole::Assistant => ChatMessage::assistant(message.text),
    }
}

/// Build the completion context for `tenant`.
///
/// Element zero is the tenant's system prompt; the rest are the tenant's `limit`
/// most recent messages, oldest first.
pub async fn assemble_history<'e, E>(executor: E, tenant: &Tenant, limit: i64) -> Result<Vec<ChatMessage>>
where
    E: SqliteExecutor<'e>,
{
    let recent = message::recent_messages(executor, &tenant.id, limit).await?;

    let mut context = Vec::with_capacity(recent.len() + 1);
    context.push(ChatMessage::system(tenant.effective_system_prompt()));
    context.extend(recent.into_iter().map(to_chat_message));
    Ok(context)
}

/// Look up a tenant and build its completion context.
pub async fn history(pool: &SqlitePool, tenant_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
    let tenant = tenant::get_tenant(pool, tenant_id).await?;
    assemble_history(pool, &tenant, limit).await
}
