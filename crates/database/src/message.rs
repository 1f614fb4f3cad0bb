//! Conversation message storage.
//!
//! Inbound messages are keyed by their external WhatsApp id. Inserting the same
//! id twice is a normal outcome ([`InsertOutcome::AlreadyExists`]), not an error,
//! so concurrent webhook redeliveries are settled by the unique constraint alone.

use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{InsertOutcome, Message, NewMessage};

const MESSAGE_COLUMNS: &str = "id, tenant_id, wa_msg_id, role, contact, text, created_at";

/// Insert a message unless one with the same external id already exists.
pub async fn insert_message<'e, E>(executor: E, message: &NewMessage) -> Result<InsertOutcome>
where
    E: SqliteExecutor<'e>,
{
    let inserted = sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT INTO messages (tenant_id, wa_msg_id, role, contact, text)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (wa_msg_id) DO NOTHING
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(&message.tenant_id)
    .bind(&message.wa_msg_id)
    .bind(message.role)
    .bind(&message.contact)
    .bind(&message.text)
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_foreign_key_violation() {
                return DatabaseError::NotFound {
                    entity: "Tenant",
                    id: message.tenant_id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(match inserted {
        Some(row) => InsertOutcome::Inserted(row),
        None => InsertOutcome::AlreadyExists,
    })
}

/// Check whether an inbound message with this external id is stored.
pub async fn message_exists<'e, E>(executor: E, wa_msg_id: &str) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM messages WHERE wa_msg_id = ?)")
            .bind(wa_msg_id)
            .fetch_one(executor)
            .await?;

    Ok(exists)
}

/// The most recent `limit` messages of a tenant, oldest first.
pub async fn recent_messages<'e, E>(executor: E, tenant_id: &str, limit: i64) -> Result<Vec<Message>>
where
    E: SqliteExecutor<'e>,
{
    let mut messages = sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE tenant_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#
    ))
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(executor)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Page through a tenant's messages, newest first.
pub async fn list_messages(
    pool: &SqlitePool,
    tenant_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE tenant_id = ?
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(tenant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Count a tenant's messages.
pub async fn count_messages(pool: &SqlitePool, tenant_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageRole, NewTenant};
    use crate::{tenant, Database};

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        for (id, phone) in [("t1", "123"), ("t2", "456")] {
            tenant::create_tenant(
                db.pool(),
                &NewTenant {
                    id: id.to_string(),
                    phone_id: phone.to_string(),
                    wh_token: "token".to_string(),
                    system_prompt: None,
                },
            )
            .await
            .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let db = test_db().await;
        let msg = NewMessage::inbound("t1", "abc", "+15550001", "Hi");

        let first = insert_message(db.pool(), &msg).await.unwrap();
        let InsertOutcome::Inserted(row) = first else {
            panic!("expected insert");
        };
        assert_eq!(row.role, MessageRole::User);
        assert_eq!(row.text, "Hi");

        let second = insert_message(db.pool(), &msg).await.unwrap();
        assert_eq!(second, InsertOutcome::AlreadyExists);

        assert!(message_exists(db.pool(), "abc").await.unwrap());
        assert!(!message_exists(db.pool(), "zzz").await.unwrap());
        assert_eq!(count_messages(db.pool(), "t1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_assistant_messages_never_conflict() {
        let db = test_db().await;
        for _ in 0..2 {
            let outcome = insert_message(db.pool(), &NewMessage::assistant("t1", "+1", "Hello"))
                .await
                .unwrap();
            assert!(matches!(outcome, InsertOutcome::Inserted(_)));
        }
        assert_eq!(count_messages(db.pool(), "t1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_unknown_tenant() {
        let db = test_db().await;
        let err = insert_message(db.pool(), &NewMessage::inbound("ghost", "m1", "+1", "Hi"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_recent_messages_window_and_order() {
        let db = test_db().await;
        for i in 0..12 {
            let msg = NewMessage::inbound("t1", format!("m{i}"), "+1", format!("text {i}"));
            insert_message(db.pool(), &msg).await.unwrap();
        }
        insert_message(db.pool(), &NewMessage::inbound("t2", "other", "+2", "not mine"))
            .await
            .unwrap();

        let recent = recent_messages(db.pool(), "t1", 10).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.first().unwrap().text, "text 2");
        assert_eq!(recent.last().unwrap().text, "text 11");
        assert!(recent.windows(2).all(|w| w[0].id < w[1].id));
        assert!(recent.iter().all(|m| m.tenant_id == "t1"));
    }

    #[tokio::test]
    async fn test_list_messages_newest_first() {
        let db = test_db().await;
        for i in 0..3 {
            let msg = NewMessage::inbound("t1", format!("m{i}"), "+1", format!("text {i}"));
            insert_message(db.pool(), &msg).await.unwrap();
        }

        let page = list_messages(db.pool(), "t1", 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text, "text 2");

        let page = list_messages(db.pool(), "t1", 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].text, "text 0");
    }
}
