//! API error types.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clipchat_models::TransitionError;
use clipchat_planner::PlannerError;
use clipchat_queue::QueueError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

static HIDE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Replace server error details with a generic message in responses.
/// Set once at startup from [`ApiConfig::is_production`](crate::ApiConfig::is_production).
pub fn hide_internal_errors(hide: bool) {
    HIDE_INTERNAL_ERRORS.store(hide, Ordering::Relaxed);
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("Store error: {0}")]
    Store(QueueError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Planner(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message for the response body. Client errors carry their bare
    /// message; server errors are logged and replaced when `hide_internal`.
    fn public_message(&self, hide_internal: bool) -> String {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Validation(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Planner(e) => e.to_string(),
            ApiError::Store(_) | ApiError::Internal(_) => {
                error!("Request failed: {}", self);
                if hide_internal {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Validation(msg) => ApiError::Validation(msg),
            QueueError::NotFound(_) => ApiError::NotFound("not found".to_string()),
            QueueError::InvalidTransition(e) => ApiError::Conflict(e.to_string()),
            QueueError::Contention(msg) => ApiError::Conflict(msg),
            QueueError::Superseded(id) => {
                ApiError::Conflict(format!("job {} was re-queued", id))
            }
            other => ApiError::Store(other),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.public_message(HIDE_INTERNAL_ERRORS.load(Ordering::Relaxed)),
        };

        (status, Json(body)).into_response()
    }
}
