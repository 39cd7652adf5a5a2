use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::allocator::AllocError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The store call itself reported failure
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("Petició invàlida: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Contention(String),
    #[error("Error intern: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(detail: impl Into<String>) -> Self {
        ApiError::Validation(detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal(detail.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detalls: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, detalls) = match self {
            ApiError::Store(err) => {
                tracing::error!("Store error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
            }
            ApiError::Validation(detail) => (
                StatusCode::BAD_REQUEST,
                "Petició invàlida".to_string(),
                Some(detail),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Contention(message) => {
                tracing::warn!("{}", message);
                (StatusCode::SERVICE_UNAVAILABLE, message, None)
            }
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error intern".to_string(),
                    Some(detail),
                )
            }
        };

        (status, Json(ErrorResponse { error, detalls })).into_response()
    }
}

impl From<AllocError> for ApiError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::Store(err) => ApiError::Store(err),
            AllocError::Contention { .. } => ApiError::Contention(err.to_string()),
            AllocError::CounterInvariant { .. } | AllocError::Overflow(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
