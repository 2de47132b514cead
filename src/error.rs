use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::lifecycle::LifecycleError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("expired: {0}")]
    Expired(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Expired(_) => "expired",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::OrderNotFound(_)
            | LifecycleError::PartnerNotFound(_)
            | LifecycleError::CustomerNotFound(_) => AppError::NotFound(err.to_string()),
            LifecycleError::InvalidStatus { .. }
            | LifecycleError::MissingPhoneForAssignment
            | LifecycleError::InvalidOrder(_) => AppError::BadRequest(err.to_string()),
            LifecycleError::Store(_) | LifecycleError::Inconsistent(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Duplicate registrations and failed OTP checks are plain client errors.
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::Expired(msg)
            | AppError::Unauthorized(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = Json(json!({
            "error": message,
            "reason": self.reason(),
        }));

        (status, body).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
