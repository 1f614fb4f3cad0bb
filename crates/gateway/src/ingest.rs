//! Message Ingestion Handler.
//!
//! Walks `entry[].changes[].value.messages[]` of a WhatsApp webhook payload.
//! Each message is handled on its own: a bad message, an unknown tenant, or a
//! duplicate delivery is logged and skipped without touching its siblings. A new
//! message is stored, its reply context assembled, and a reply job enqueued in
//! one transaction.

use database::{message, task, tenant, Database, InsertOutcome, NewMessage, NewTask, Tenant};
use reply_worker::{ReplyJob, REPLY_KIND};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::GatewayConfig;
use crate::context::RequestContext;

/// Top-level webhook body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub object: Option<String>,
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookEntry {
    pub id: Option<String>,
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookChange {
    pub field: Option<String>,
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangeValue {
    pub metadata: Option<Metadata>,
    /// Kept raw so one malformed message cannot reject the batch.
    pub messages: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub phone_number_id: Option<String>,
    pub display_phone_number: Option<String>,
}

/// One inbound WhatsApp message.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    /// Sender phone number.
    pub from: Option<String>,
    /// WhatsApp message id.
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<TextContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TextContent {
    pub body: Option<String>,
}

/// A message with every field ingestion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidMessage {
    pub wa_msg_id: String,
    pub sender: String,
    pub text: String,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

impl InboundMessage {
    /// Require sender, text body, and message id.
    pub fn validate(self) -> Result<ValidMessage, &'static str> {
        let sender = non_empty(self.from).ok_or("missing sender")?;
        let wa_msg_id = non_empty(self.id).ok_or("missing message id")?;
        let text = non_empty(self.text.and_then(|t| t.body)).ok_or("missing text body")?;
        Ok(ValidMessage {
            wa_msg_id,
            sender,
            text,
        })
    }
}

/// What happened to one message of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored and handed to the reply worker.
    Queued { message_id: i64, task_id: String },
    /// Already stored by an earlier delivery.
    Duplicate { wa_msg_id: String },
    /// Not processed.
    Skipped { reason: String },
    /// Processing failed; nothing was stored.
    Failed { error: String },
}

/// Per-message outcomes of one webhook call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestSummary {
    pub fn queued(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IngestOutcome::Queued { .. }))
            .count()
    }
}

fn skipped(reason: impl Into<String>) -> IngestOutcome {
    IngestOutcome::Skipped {
        reason: reason.into(),
    }
}

/// Process every message in a parsed webhook body.
#[instrument(skip_all, fields(correlation_id = %ctx.correlation_id))]
pub async fn ingest_payload(
    db: &Database,
    config: &GatewayConfig,
    ctx: &RequestContext,
    payload: WebhookPayload,
) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for change in payload.entry.into_iter().flat_map(|e| e.changes) {
        let value = change.value;
        if value.messages.is_empty() {
            // Status callbacks carry no messages.
            continue;
        }

        let Some(phone_id) = value.metadata.and_then(|m| non_empty(m.phone_number_id)) else {
            warn!("Change without phone_number_id; skipping its messages");
            summary
                .outcomes
                .extend(value.messages.iter().map(|_| skipped("missing phone_number_id")));
            continue;
        };

        let tenant = match tenant::get_tenant_by_phone_id(db.pool(), &phone_id).await {
            Ok(Some(tenant)) => tenant,
            Ok(None) => {
                warn!(phone_id = %phone_id, "No tenant for phone_number_id; skipping messages");
                summary
                    .outcomes
                    .extend(value.messages.iter().map(|_| skipped("unknown tenant")));
                continue;
            }
            Err(e) => {
                warn!(phone_id = %phone_id, error = %e, "Tenant lookup failed");
                summary.outcomes.extend(
                    value
                        .messages
                        .iter()
                        .map(|_| IngestOutcome::Failed { error: e.to_string() }),
                );
                continue;
            }
        };

        for raw in value.messages {
            let outcome = ingest_raw_message(db, config, ctx, &tenant, raw).await;
            summary.outcomes.push(outcome);
        }
    }

    info!(
        messages = summary.outcomes.len(),
        queued = summary.queued(),
        "Webhook processed"
    );
    summary
}

async fn ingest_raw_message(
    db: &Database,
    config: &GatewayConfig,
    ctx: &RequestContext,
    tenant: &Tenant,
    raw: Value,
) -> IngestOutcome {
    let inbound = match serde_json::from_value::<InboundMessage>(raw) {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!(error = %e, "Unreadable message; skipping");
            return skipped("unreadable message");
        }
    };

    let kind = inbound.kind.clone();
    let message = match inbound.validate() {
        Ok(message) => message,
        Err(reason) => {
            warn!(tenant_id = %tenant.id, kind = kind.as_deref().unwrap_or("-"), reason, "Skipping message");
            return skipped(reason);
        }
    };

    match ingest_message(db, config, ctx, tenant, &message).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(
                tenant_id = %tenant.id,
                wa_msg_id = %message.wa_msg_id,
                error = %e,
                "Failed to ingest message; rolled back"
            );
            IngestOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Store one validated message and enqueue its reply job.
///
/// The insert, the history read, and the enqueue share a transaction; any error
/// rolls all of them back.
pub async fn ingest_message(
    db: &Database,
    config: &GatewayConfig,
    ctx: &RequestContext,
    tenant: &Tenant,
    message: &ValidMessage,
) -> database::Result<IngestOutcome> {
    if message::message_exists(db.pool(), &message.wa_msg_id).await? {
        info!(wa_msg_id = %message.wa_msg_id, "Duplicate delivery ignored");
        return Ok(IngestOutcome::Duplicate {
            wa_msg_id: message.wa_msg_id.clone(),
        });
    }

    let mut tx = db.pool().begin().await?;

    let new_message = NewMessage::inbound(
        &tenant.id,
        &message.wa_msg_id,
        &message.sender,
        &message.text,
    );
    let stored = match message::insert_message(&mut *tx, &new_message).await? {
        InsertOutcome::Inserted(stored) => stored,
        InsertOutcome::AlreadyExists => {
            // A concurrent delivery of the same message won the insert.
            tx.rollback().await?;
            info!(wa_msg_id = %message.wa_msg_id, "Duplicate delivery ignored");
            return Ok(IngestOutcome::Duplicate {
                wa_msg_id: message.wa_msg_id.clone(),
            });
        }
    };
    debug!(message_id = stored.id, tenant_id = %tenant.id, "Inbound message stored");

    let context = rag::assemble_history(&mut *tx, tenant, config.history_window).await?;

    let job = ReplyJob {
        tenant_id: tenant.id.clone(),
        phone_id: tenant.phone_id.clone(),
        wh_token: tenant.wh_token.clone(),
        system_prompt: tenant.effective_system_prompt().to_string(),
        context,
        recipient: message.sender.clone(),
        message_id: stored.id,
    };
    let new_task = NewTask::new(REPLY_KIND, &job)?
        .with_max_attempts(config.max_attempts)
        .with_correlation_id(&ctx.correlation_id);
    let queued = task::enqueue(&mut *tx, &new_task).await?;

    tx.commit().await?;

    info!(
        tenant_id = %tenant.id,
        message_id = stored.id,
        task_id = %queued.id,
        context_len = job.context.len(),
        "Reply job enqueued"
    );

    Ok(IngestOutcome::Queued {
        message_id: stored.id,
        task_id: queued.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{NewTenant, Task, TaskState};
    use provider_core::ChatMessage;
    use serde_json::json;

    async fn test_db() -> Database {
        seeded(Database::connect("sqlite::memory:").await.unwrap()).await
    }

    async fn seeded(db: Database) -> Database {
        db.migrate().await.unwrap();
        tenant::create_tenant(
            db.pool(),
            &NewTenant {
                id: "t1".to_string(),
                phone_id: "123".to_string(),
                wh_token: "wa-token".to_string(),
                system_prompt: Some("You are the pizzeria bot.".to_string()),
            },
        )
        .await
        .unwrap();
        db
    }

    fn payload(phone_id: &str, messages: Value) -> WebhookPayload {
        serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "metadata": {"phone_number_id": phone_id},
                        "messages": messages
                    }
                }]
            }]
        }))
        .unwrap()
    }

    fn text_message(id: &str, from: &str, body: &str) -> Value {
        json!({"from": from, "id": id, "type": "text", "text": {"body": body}})
    }

    async fn queued_tasks(db: &Database) -> Vec<Task> {
        task::list_tasks_by_kind(db.pool(), REPLY_KIND, 10).await.unwrap()
    }

    #[test]
    fn test_validate_requires_fields() {
        let missing_text: InboundMessage =
            serde_json::from_value(json!({"from": "+1", "id": "x", "type": "image"})).unwrap();
        assert_eq!(missing_text.validate(), Err("missing text body"));

        let blank_sender: InboundMessage =
            serde_json::from_value(json!({"from": " ", "id": "x", "text": {"body": "hi"}})).unwrap();
        assert_eq!(blank_sender.validate(), Err("missing sender"));
    }

    #[tokio::test]
    async fn test_message_is_stored_and_reply_job_enqueued() {
        let db = test_db().await;
        let ctx = RequestContext::new("req-42");
        let config = GatewayConfig::default();

        let summary = ingest_payload(
            &db,
            &config,
            &ctx,
            payload("123", json!([text_message("abc", "+15550001", "Hi")])),
        )
        .await;
        assert_eq!(summary.queued(), 1);

        let messages = message::recent_messages(db.pool(), "t1", 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Hi");
        assert_eq!(messages[0].wa_msg_id.as_deref(), Some("abc"));

        let tasks = queued_tasks(&db).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].state, TaskState::Pending);
        assert_eq!(tasks[0].max_attempts, 4);
        assert_eq!(tasks[0].correlation_id.as_deref(), Some("req-42"));

        let job: ReplyJob = tasks[0].payload_as().unwrap();
        assert_eq!(
            job.context,
            vec![
                ChatMessage::system("You are the pizzeria bot."),
                ChatMessage::user("Hi"),
            ]
        );
        assert_eq!(job.recipient, "+15550001");
        assert_eq!(job.phone_id, "123");
        assert_eq!(job.wh_token, "wa-token");
        assert_eq!(job.message_id, messages[0].id);
    }

    #[tokio::test]
    async fn test_redelivery_is_ignored() {
        let db = test_db().await;
        let ctx = RequestContext::generate();
        let config = GatewayConfig::default();
        let messages = json!([text_message("abc", "+15550001", "Hi")]);

        ingest_payload(&db, &config, &ctx, payload("123", messages.clone())).await;
        let summary = ingest_payload(&db, &config, &ctx, payload("123", messages)).await;

        assert!(matches!(
            summary.outcomes.as_slice(),
            [IngestOutcome::Duplicate { wa_msg_id }] if wa_msg_id == "abc"
        ));
        assert_eq!(message::count_messages(db.pool(), "t1").await.unwrap(), 1);
        assert_eq!(queued_tasks(&db).await.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_batch() {
        let db = test_db().await;
        let summary = ingest_payload(
            &db,
            &GatewayConfig::default(),
            &RequestContext::generate(),
            payload(
                "123",
                json!([
                    text_message("ok-1", "+15550001", "Hello"),
                    {"from": "+15550002", "id": "img-1", "type": "image", "image": {"id": "media"}},
                    {"from": 12, "id": ["not", "a", "string"]},
                ]),
            ),
        )
        .await;

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.queued(), 1);
        assert_eq!(message::count_messages(db.pool(), "t1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_skipped() {
        let db = test_db().await;
        let summary = ingest_payload(
            &db,
            &GatewayConfig::default(),
            &RequestContext::generate(),
            payload("999", json!([text_message("abc", "+15550001", "Hi")])),
        )
        .await;

        assert_eq!(summary.outcomes, vec![skipped("unknown tenant")]);
        assert!(queued_tasks(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_history_window_limits_context() {
        let db = test_db().await;
        let config = GatewayConfig {
            history_window: 2,
            ..GatewayConfig::default()
        };
        let ctx = RequestContext::generate();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            let id = format!("m{i}");
            ingest_payload(&db, &config, &ctx, payload("123", json!([text_message(&id, "+1", text)])))
                .await;
        }

        let tasks = queued_tasks(&db).await;
        let newest = tasks
            .iter()
            .map(|t| t.payload_as::<ReplyJob>().unwrap())
            .max_by_key(|job| job.message_id)
            .unwrap();
        assert_eq!(
            newest.context,
            vec![
                ChatMessage::system("You are the pizzeria bot."),
                ChatMessage::user("two"),
                ChatMessage::user("three"),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deliveries_store_once() {
        let path = std::env::temp_dir().join(format!("ingest-race-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let db = seeded(Database::connect(&url).await.unwrap()).await;
        let tenant = tenant::get_tenant(db.pool(), "t1").await.unwrap();
        let message = ValidMessage {
            wa_msg_id: "wamid.same".to_string(),
            sender: "+15550001".to_string(),
            text: "Are you open?".to_string(),
        };
        let config = GatewayConfig::default();
        let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let (db, config, tenant, message, barrier) = (
                    db.clone(),
                    config.clone(),
                    tenant.clone(),
                    message.clone(),
                    barrier.clone(),
                );
                tokio::spawn(async move {
                    barrier.wait().await;
                    let ctx = RequestContext::generate();
                    ingest_message(&db, &config, &ctx, &tenant, &message).await
                })
            })
            .collect();

        let mut queued = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                IngestOutcome::Queued { .. } => queued += 1,
                IngestOutcome::Duplicate { wa_msg_id } => {
                    assert_eq!(wa_msg_id, "wamid.same");
                    duplicates += 1;
                }
                other => panic!("Unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(queued, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(message::count_messages(db.pool(), "t1").await.unwrap(), 1);
        assert_eq!(queued_tasks(&db).await.len(), 1);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
