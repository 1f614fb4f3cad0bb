//! RAG query endpoint.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::Result;
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub tenant_id: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct RagQueryResponse {
    pub answer: String,
    pub tenant_id: String,
    pub query: String,
}

/// Answer a question from a tenant's knowledge base.
///
/// A blank query finds no entries and gets the fallback answer.
pub async fn query(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(request): ApiJson<RagQueryRequest>,
) -> Result<Json<RagQueryResponse>> {
    tracing::info!(
        correlation_id = %ctx.correlation_id,
        tenant_id = %request.tenant_id,
        "RAG query received"
    );

    let answer = state
        .rag
        .answer_for_tenant(&ctx.correlation_id, &request.tenant_id, &request.query)
        .await?;

    Ok(Json(RagQueryResponse {
        answer,
        tenant_id: request.tenant_id,
        query: request.query,
    }))
}
