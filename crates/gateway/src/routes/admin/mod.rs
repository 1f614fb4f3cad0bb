//! Admin API: tenants, their messages and FAQ entries, and queued tasks.
//!
//! Every route requires the admin token, sent as `X-Admin-Token` or as a
//! bearer token.

pub mod faqs;
pub mod tasks;
pub mod tenants;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// `?limit=&offset=` pagination.
#[derive(Debug, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

fn provided_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get("x-admin-token").and_then(|v| v.to_str().ok()) {
        return Some(token.trim());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare tokens without exiting early on the first differing byte.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Reject requests without the configured admin token.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Err(ApiError::Internal("ADMIN_API_TOKEN is not configured".to_string()));
    };

    let authorized = provided_token(request.headers())
        .is_some_and(|provided| tokens_match(provided, expected));
    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Admin request with missing or invalid token");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Admin routes, relative to `/admin`.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tenants", get(tenants::list).post(tenants::create))
        .route(
            "/tenants/:tenant_id",
            get(tenants::get).put(tenants::update).delete(tenants::delete),
        )
        .route("/tenants/:tenant_id/messages", get(tenants::messages))
        .route("/tenants/:tenant_id/faqs", get(faqs::list).post(faqs::create))
        .route("/tenants/:tenant_id/faqs/bulk-import", post(faqs::bulk_import))
        .route(
            "/tenants/:tenant_id/faqs/:faq_id",
            get(faqs::get).put(faqs::update).delete(faqs::delete),
        )
        .route("/tasks/:task_id", get(tasks::get))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}
