//! FAQ knowledge-base management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use database::{faq, task, tenant, Faq, NewTask};
use reply_worker::{FaqImportItem, FaqImportJob, FAQ_IMPORT_KIND};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Page;
use crate::context::RequestContext;
use crate::error::{ApiError, Result};
use crate::extract::ApiJson;
use crate::state::AppState;

/// FAQ entry as returned by the API; the vector itself is omitted.
#[derive(Debug, Serialize)]
pub struct FaqView {
    pub id: i64,
    pub tenant_id: String,
    pub question: String,
    pub answer: String,
    pub has_embedding: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Faq> for FaqView {
    fn from(f: Faq) -> Self {
        Self {
            has_embedding: f.has_embedding(),
            id: f.id,
            tenant_id: f.tenant_id,
            question: f.question,
            answer: f.answer,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FaqInput {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct FaqChanges {
    pub question: Option<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub items: Vec<FaqImportItem>,
}

#[derive(Debug, Serialize)]
pub struct BulkImportAccepted {
    pub task_id: String,
    pub total_items: usize,
}

fn require_text(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

/// Embed an entry, storing it without a vector when embedding fails.
async fn embed_or_none(state: &AppState, question: &str, answer: &str) -> Option<Vec<f32>> {
    let embedder = match state.embedder.get().await {
        Ok(embedder) => embedder,
        Err(e) => {
            warn!(error = %e, "Embedder unavailable; storing FAQ without embedding");
            return None;
        }
    };

    match rag::embed_faq(embedder.as_ref(), question, answer).await {
        Ok(embedding) => embedding,
        Err(e) => {
            warn!(error = %e, "Embedding failed; storing FAQ without embedding");
            None
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<FaqView>>> {
    let pool = state.db.pool();
    tenant::get_tenant(pool, &tenant_id).await?;
    let faqs = faq::list_faqs(pool, &tenant_id, page.limit(), page.offset()).await?;
    Ok(Json(faqs.into_iter().map(FaqView::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    ApiJson(input): ApiJson<FaqInput>,
) -> Result<(StatusCode, Json<FaqView>)> {
    let question = require_text("question", &input.question)?;
    let answer = require_text("answer", &input.answer)?;
    tenant::get_tenant(state.db.pool(), &tenant_id).await?;

    let embedding = embed_or_none(&state, &question, &answer).await;
    let created = faq::create_faq(
        state.db.pool(),
        &tenant_id,
        &question,
        &answer,
        embedding.as_deref(),
    )
    .await?;

    info!(tenant_id = %tenant_id, faq_id = created.id, embedded = created.has_embedding(), "FAQ created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Path((tenant_id, faq_id)): Path<(String, i64)>,
) -> Result<Json<FaqView>> {
    let found = faq::get_faq(state.db.pool(), &tenant_id, faq_id).await?;
    Ok(Json(found.into()))
}

/// Change question and/or answer. A text change re-embeds the entry.
pub async fn update(
    State(state): State<AppState>,
    Path((tenant_id, faq_id)): Path<(String, i64)>,
    ApiJson(changes): ApiJson<FaqChanges>,
) -> Result<Json<FaqView>> {
    let existing = faq::get_faq(state.db.pool(), &tenant_id, faq_id).await?;

    let question = match &changes.question {
        Some(q) => require_text("question", q)?,
        None => existing.question.clone(),
    };
    let answer = match &changes.answer {
        Some(a) => require_text("answer", a)?,
        None => existing.answer.clone(),
    };

    let text_changed = question != existing.question || answer != existing.answer;
    let embedding = if text_changed || !existing.has_embedding() {
        embed_or_none(&state, &question, &answer).await
    } else {
        existing.embedding
    };

    let updated = faq::update_faq(
        state.db.pool(),
        &tenant_id,
        faq_id,
        &question,
        &answer,
        embedding.as_deref(),
    )
    .await?;

    info!(tenant_id = %tenant_id, faq_id, re_embedded = text_changed, "FAQ updated");
    Ok(Json(updated.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((tenant_id, faq_id)): Path<(String, i64)>,
) -> Result<StatusCode> {
    faq::delete_faq(state.db.pool(), &tenant_id, faq_id).await?;
    info!(tenant_id = %tenant_id, faq_id, "FAQ deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Queue a batch of entries for embedding by the worker.
pub async fn bulk_import(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(tenant_id): Path<String>,
    ApiJson(request): ApiJson<BulkImportRequest>,
) -> Result<(StatusCode, Json<BulkImportAccepted>)> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest("items must not be empty".to_string()));
    }
    tenant::get_tenant(state.db.pool(), &tenant_id).await?;

    let total_items = request.items.len();
    let job = FaqImportJob {
        tenant_id: tenant_id.clone(),
        items: request.items,
    };
    let new_task = NewTask::new(FAQ_IMPORT_KIND, &job)?
        .with_max_attempts(state.config.max_attempts)
        .with_correlation_id(&ctx.correlation_id);
    let queued = task::enqueue(state.db.pool(), &new_task).await?;

    info!(tenant_id = %tenant_id, task_id = %queued.id, total_items, "FAQ import queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(BulkImportAccepted {
            task_id: queued.id,
            total_items,
        }),
    ))
}
