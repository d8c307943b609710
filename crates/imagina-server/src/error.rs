use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imagina_ai::AiError;
use imagina_shared::RasterError;
use imagina_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Image not found: {0}")]
    NotFound(Uuid),

    #[error("Image already exists: {0}")]
    Conflict(Uuid),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Image generation was blocked by safety filters: {0}")]
    Blocked(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Blocked(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Image generation was blocked by safety filters. Try a different prompt."
                    .to_string(),
            ),
            ServerError::Provider(_) => (
                StatusCode::BAD_GATEWAY,
                "The AI provider could not complete the request".to_string(),
            ),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => ServerError::BadRequest(msg),
            StoreError::Json(e) => ServerError::BadRequest(format!("Invalid JSON: {e}")),
            StoreError::NotFound(id) => ServerError::NotFound(id),
            StoreError::DuplicateId(id) => ServerError::Conflict(id),
            other => {
                tracing::error!(error = %other, "store failure");
                ServerError::Internal(other.to_string())
            }
        }
    }
}

impl From<AiError> for ServerError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Validation(msg) => ServerError::BadRequest(msg),
            AiError::Blocked(reason) => {
                tracing::info!(%reason, "generation blocked by provider");
                ServerError::Blocked(reason)
            }
            other => {
                tracing::warn!(error = %other, "provider failure");
                ServerError::Provider(other.to_string())
            }
        }
    }
}

impl From<RasterError> for ServerError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::InvalidDimensions { .. } | RasterError::UnsupportedFormat(_) => {
                ServerError::BadRequest(err.to_string())
            }
            RasterError::Image(e) => ServerError::Internal(format!("Image processing failed: {e}")),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("Background task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = Uuid::new_v4();
        let cases = [
            (ServerError::from(StoreError::NotFound(id)), StatusCode::NOT_FOUND),
            (ServerError::from(StoreError::DuplicateId(id)), StatusCode::CONFLICT),
            (ServerError::from(StoreError::validation("bad")), StatusCode::BAD_REQUEST),
            (
                ServerError::from(AiError::Blocked("SAFETY".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ServerError::from(AiError::Provider("boom".into())), StatusCode::BAD_GATEWAY),
            (
                ServerError::from(RasterError::InvalidDimensions { width: 0, height: 5 }),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
