//! SQLite persistence layer for the WhatsApp bot backend.
//!
//! This crate provides async database operations for tenants, conversation
//! messages, the FAQ knowledge store, and the durable task queue shared by the
//! gateway and the reply workers, using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{message, tenant, Database, InsertOutcome, NewMessage, NewTenant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:whatsapp_bot.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Register a tenant
//!     let new_tenant = NewTenant {
//!         id: "t1".to_string(),
//!         phone_id: "123".to_string(),
//!         wh_token: "EAAG...".to_string(),
//!         system_prompt: None,
//!     };
//!     tenant::create_tenant(db.pool(), &new_tenant).await?;
//!
//!     // Store an inbound message exactly once
//!     let inbound = NewMessage::inbound("t1", "wamid.abc", "+15550001", "Hi");
//!     if let InsertOutcome::Inserted(row) = message::insert_message(db.pool(), &inbound).await? {
//!         println!("stored message {}", row.id);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod faq;
pub mod message;
pub mod models;
pub mod task;
pub mod tenant;
pub mod vector;

pub use error::{DatabaseError, Result};
pub use models::{
    Faq, FaqMatch, InsertOutcome, Message, MessageRole, NewMessage, NewTenant, Tenant,
    TenantUpdate, DEFAULT_SYSTEM_PROMPT,
};
pub use task::{NewTask, Task, TaskState};

// Re-exported so callers can run queries inside their own transactions.
pub use sqlx::{SqliteExecutor, SqlitePool};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size. Sized for concurrent webhook requests plus a worker pool.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/whatsapp_bot.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Round-trip a trivial query, for readiness checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_ping() {
        let db = test_db().await;
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_tenant_delete_cascades() {
        let db = test_db().await;

        let new_tenant = NewTenant {
            id: "t1".to_string(),
            phone_id: "123".to_string(),
            wh_token: "token".to_string(),
            system_prompt: Some("Be helpful.".to_string()),
        };
        tenant::create_tenant(db.pool(), &new_tenant).await.unwrap();

        message::insert_message(db.pool(), &NewMessage::inbound("t1", "abc", "+1", "Hi"))
            .await
            .unwrap();
        faq::create_faq(db.pool(), "t1", "Q", "A", Some(&[1.0, 0.0]))
            .await
            .unwrap();

        tenant::delete_tenant(db.pool(), "t1").await.unwrap();

        assert_eq!(message::count_messages(db.pool(), "t1").await.unwrap(), 0);
        assert_eq!(faq::count_faqs(db.pool(), "t1").await.unwrap(), 0);
        assert!(!message::message_exists(db.pool(), "abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_rolls_back_with_transaction() {
        let db = test_db().await;
        let new_tenant = NewTenant {
            id: "t1".to_string(),
            phone_id: "123".to_string(),
            wh_token: "token".to_string(),
            system_prompt: None,
        };
        tenant::create_tenant(db.pool(), &new_tenant).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let outcome = message::insert_message(&mut *tx, &NewMessage::inbound("t1", "abc", "+1", "Hi"))
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
        tx.rollback().await.unwrap();

        assert!(!message::message_exists(db.pool(), "abc").await.unwrap());
    }
}
