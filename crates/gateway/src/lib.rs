//! HTTP gateway for the multi-tenant WhatsApp bot.
//!
//! Receives webhook deliveries, records inbound messages exactly once and
//! queues a reply task for each, answers knowledge-base queries, and exposes
//! an admin API for tenants, FAQs and task status. Prometheus metrics are
//! served on `/metrics`. Replies themselves are produced by the
//! `reply-worker` crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use database::Database;
//! use gateway::{app, AppState, GatewayConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let db = Database::connect(&config.database_url).await?;
//! db.migrate().await?;
//!
//! let addr = config.addr;
//! let state = AppState::new(
//!     db,
//!     config,
//!     Arc::new(openai_provider::embedder_slot()),
//!     Arc::new(openai_provider::completer_slot()),
//! );
//! let listener = tokio::net::TcpListener::bind(addr).await?;
//! axum::serve(listener, app(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, GatewayConfig};
pub use context::{RequestContext, REQUEST_ID_HEADER};
pub use error::ApiError;
pub use ingest::{ingest_payload, IngestOutcome, IngestSummary};
pub use state::AppState;
pub use telemetry::init_metrics;

use axum::Router;

/// The complete gateway application.
pub fn app(state: AppState) -> Router {
    routes::router(state)
}
