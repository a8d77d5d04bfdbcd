//! API error type and HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pawfeed_mqtt::DispatchError;

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request payload or query.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials/token.
    #[error("{0}")]
    Unauthorized(String),

    /// Resource does not exist (or belongs to another user).
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// The feed command could not be confirmed by the device.
    #[error("Failed to send feeding command")]
    Dispatch(#[source] DispatchError),

    /// Anything else.
    #[error("Server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Dispatch(source) => serde_json::json!({
                "message": self.to_string(),
                "error": source.to_string(),
            }),
            ApiError::Internal(source) => {
                tracing::error!(error = %source, "internal error");
                serde_json::json!({"message": self.to_string()})
            }
            _ => serde_json::json!({"message": self.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

impl From<pawfeed_storage::Error> for ApiError {
    fn from(e: pawfeed_storage::Error) -> Self {
        match e {
            pawfeed_storage::Error::NotFound(msg) => ApiError::NotFound(msg),
            pawfeed_storage::Error::Conflict(msg) => ApiError::Conflict(msg),
            pawfeed_storage::Error::InvalidInput(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError::Dispatch(e)
    }
}
