use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    // Request errors
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not a group conversation")]
    NotGroupConversation,

    // Lookup errors
    #[error("Group not found")]
    GroupNotFound,

    // Identity errors
    #[error("Unauthorized")]
    Unauthorized,

    // Store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // 400 Bad Request
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotGroupConversation => (StatusCode::BAD_REQUEST, self.to_string()),

            // 401 Unauthorized
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),

            // 404 Not Found
            AppError::GroupNotFound => (StatusCode::NOT_FOUND, self.to_string()),

            // 503 Service Unavailable
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Store unavailable".to_string(),
                )
            }

            // 500 Internal Server Error
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
