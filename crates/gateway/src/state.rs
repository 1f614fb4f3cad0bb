//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use provider_core::{ChatCompleter, Embedder, ProviderSlot};
use rag::RagService;

use crate::config::GatewayConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<GatewayConfig>,
    /// Used by admin FAQ writes.
    pub embedder: Arc<ProviderSlot<dyn Embedder>>,
    pub rag: RagService,
}

impl AppState {
    pub fn new(
        db: Database,
        config: GatewayConfig,
        embedder: Arc<ProviderSlot<dyn Embedder>>,
        completer: Arc<ProviderSlot<dyn ChatCompleter>>,
    ) -> Self {
        let rag = RagService::new(db.clone(), Arc::clone(&embedder), completer)
            .with_top_k(config.rag_top_k);
        Self {
            db,
            config: Arc::new(config),
            embedder,
            rag,
        }
    }
}
