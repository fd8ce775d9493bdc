//! Store and queue error types.

use clipchat_models::{JobId, TransitionError};
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("Concurrent update contention: {0}")]
    Contention(String),

    #[error("Result for job {0} superseded by a newer run")]
    Superseded(JobId),

    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(id: &JobId) -> Self {
        Self::NotFound(id.clone())
    }

    pub fn contention(msg: impl Into<String>) -> Self {
        Self::Contention(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound(_))
    }

    /// Failures of the underlying store rather than of the request.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, QueueError::Store(_) | QueueError::Redis(_) | QueueError::Json(_))
    }
}
