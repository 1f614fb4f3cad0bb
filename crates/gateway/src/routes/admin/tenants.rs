//! Tenant management and message listing.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::{message, tenant, Message, NewTenant, Tenant, TenantUpdate};
use serde::Serialize;
use tracing::info;

use super::Page;
use crate::error::{ApiError, Result};
use crate::extract::ApiJson;
use crate::state::AppState;

/// Tenant as returned by the API. The access token is never echoed.
#[derive(Debug, Serialize)]
pub struct TenantView {
    pub id: String,
    pub phone_id: String,
    pub system_prompt: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Tenant> for TenantView {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            phone_id: t.phone_id,
            system_prompt: t.system_prompt,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub items: Vec<Message>,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<TenantView>>> {
    let tenants = tenant::list_tenants(state.db.pool()).await?;
    Ok(Json(tenants.into_iter().map(TenantView::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(new_tenant): ApiJson<NewTenant>,
) -> Result<(StatusCode, Json<TenantView>)> {
    require("id", &new_tenant.id)?;
    require("phone_id", &new_tenant.phone_id)?;
    require("wh_token", &new_tenant.wh_token)?;

    let created = tenant::create_tenant(state.db.pool(), &new_tenant).await?;
    info!(tenant_id = %created.id, phone_id = %created.phone_id, "Tenant created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<TenantView>> {
    let found = tenant::get_tenant(state.db.pool(), &tenant_id).await?;
    Ok(Json(found.into()))
}

pub async fn update(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    ApiJson(changes): ApiJson<TenantUpdate>,
) -> Result<Json<TenantView>> {
    if let Some(phone_id) = &changes.phone_id {
        require("phone_id", phone_id)?;
    }
    if let Some(wh_token) = &changes.wh_token {
        require("wh_token", wh_token)?;
    }

    let updated = tenant::update_tenant(state.db.pool(), &tenant_id, &changes).await?;
    info!(tenant_id = %updated.id, "Tenant updated");
    Ok(Json(updated.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<StatusCode> {
    tenant::delete_tenant(state.db.pool(), &tenant_id).await?;
    info!(tenant_id = %tenant_id, "Tenant deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// A tenant's messages, newest first.
pub async fn messages(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<MessagePage>> {
    let pool = state.db.pool();
    tenant::get_tenant(pool, &tenant_id).await?;

    let items = message::list_messages(pool, &tenant_id, page.limit(), page.offset()).await?;
    let total = message::count_messages(pool, &tenant_id).await?;

    Ok(Json(MessagePage {
        total,
        limit: page.limit(),
        offset: page.offset(),
        items,
    }))
}
