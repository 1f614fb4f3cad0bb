//! WhatsApp webhook: verification handshake and message delivery.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::error::{ApiError, Result};
use crate::ingest::{ingest_payload, WebhookPayload};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub message: &'static str,
}

impl WebhookAck {
    fn received() -> Self {
        Self {
            status: "received",
            message: "Webhook processed successfully.",
        }
    }
}

/// Answer the subscription handshake with the challenge.
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<String> {
    let Some(expected) = state.config.verify_token.as_deref() else {
        warn!("Webhook verification attempted but VERIFY_TOKEN is not configured");
        return Err(ApiError::Internal("VERIFY_TOKEN is not configured".to_string()));
    };

    let subscribed = params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(expected);
    if !subscribed {
        warn!(mode = params.mode.as_deref().unwrap_or("-"), "Webhook verification rejected");
        return Err(ApiError::Forbidden("Verification failed".to_string()));
    }

    info!("Webhook verified");
    Ok(params.challenge.unwrap_or_default())
}

/// Accept a webhook delivery.
///
/// Only a body that is not JSON is rejected. Everything else, including
/// unknown shapes, is acknowledged.
pub async fn receive(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(correlation_id = %ctx.correlation_id, error = %e, "Rejected unparseable webhook body");
        ApiError::BadRequest("Invalid JSON payload".to_string())
    })?;

    let payload = match serde_json::from_value::<WebhookPayload>(value) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(correlation_id = %ctx.correlation_id, error = %e, "Unexpected webhook shape; ignoring");
            WebhookPayload::default()
        }
    };

    ingest_payload(&state.db, &state.config, &ctx, payload).await;
    Ok(Json(WebhookAck::received()))
}
