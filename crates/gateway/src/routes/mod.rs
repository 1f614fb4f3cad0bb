//! Route handlers for the gateway.

pub mod admin;
pub mod health;
pub mod rag;
pub mod webhook;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{context, telemetry};

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(telemetry::metrics_handler))
        // WhatsApp webhook
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        // Knowledge base
        .route("/rag/query", post(rag::query))
        // Admin API
        .nest("/admin", admin::router(state.clone()))
        .layer(middleware::from_fn(telemetry::track_http))
        .layer(middleware::from_fn(context::request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
