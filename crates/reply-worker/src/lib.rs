//! Queue worker for the WhatsApp bot.
//!
//! Tasks are claimed from the `tasks` table with a lease. Each claim counts as
//! an attempt and runs under a soft time limit; failures are retried with
//! exponential backoff until the attempt budget is spent, then dead-lettered.
//!
//! Two job kinds are handled:
//! - [`REPLY_KIND`]: complete the captured conversation, store the assistant
//!   message, and deliver it through WhatsApp.
//! - [`FAQ_IMPORT_KIND`]: embed and store a batch of FAQ entries.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use database::Database;
//! use reply_worker::{ReplyWorker, WorkerConfig};
//! use whatsapp_client::WhatsAppClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkerConfig::from_env()?;
//! let db = Database::connect(&config.database_url).await?;
//! let worker = ReplyWorker::new(
//!     db,
//!     Arc::new(openai_provider::completer_slot()),
//!     Arc::new(openai_provider::embedder_slot()),
//!     Arc::new(WhatsAppClient::from_env()?),
//!     config,
//! );
//! while let Some(result) = worker.run_once().await? {
//!     println!("{result:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod worker;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use jobs::{
    FaqImportFailure, FaqImportItem, FaqImportJob, FaqImportReport, ReplyJob, FAQ_IMPORT_KIND,
    REPLY_KIND,
};
pub use worker::{ProcessResult, ReplyOutcome, ReplyWorker};
