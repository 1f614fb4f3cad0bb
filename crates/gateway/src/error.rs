//! Error types for HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use rag::RagError;
use thiserror::Error;

/// Errors returned by gateway handlers.
///
/// Rendered as `{"error": <kind>, "detail": <message>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing or invalid admin token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            ApiError::Database(err) => match err {
                DatabaseError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                DatabaseError::AlreadyExists { .. } => (StatusCode::CONFLICT, "conflict"),
                DatabaseError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::TenantNotFound(id) => ApiError::NotFound(format!("Tenant {id} not found")),
            RagError::Unavailable(e) => ApiError::ServiceUnavailable(e.to_string()),
            RagError::Upstream(e) => {
                ApiError::ServiceUnavailable(format!("answer generation failed: {e}"))
            }
            RagError::Database(e) => ApiError::Database(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            match self {
                ApiError::Database(_) => "An internal error occurred.".to_string(),
                other => other.to_string(),
            }
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "error": kind,
            "detail": detail,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use provider_core::ProviderError;
    use serde_json::Value;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = render(ApiError::NotFound("Tenant t9 not found".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["detail"], "Tenant t9 not found");
    }

    #[tokio::test]
    async fn test_database_errors_map_to_status() {
        let exists = DatabaseError::AlreadyExists {
            entity: "Tenant",
            id: "t1".to_string(),
        };
        assert_eq!(render(exists.into()).await.0, StatusCode::CONFLICT);

        let invalid = DatabaseError::Validation("bad".to_string());
        assert_eq!(render(invalid.into()).await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rag_errors_map_to_status() {
        let unavailable = RagError::Unavailable(ProviderError::Unavailable("no key".to_string()));
        assert_eq!(render(unavailable.into()).await.0, StatusCode::SERVICE_UNAVAILABLE);

        let missing = RagError::TenantNotFound("t9".to_string());
        assert_eq!(render(missing.into()).await.0, StatusCode::NOT_FOUND);
    }
}
