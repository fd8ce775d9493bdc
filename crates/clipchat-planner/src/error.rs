//! Planner error types.

use thiserror::Error;

pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Planner not configured: {0}")]
    NotConfigured(String),

    #[error("Planner returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Planner returned non-JSON: {0}")]
    NonJson(String),

    #[error("Planner response missing content")]
    MissingContent,

    #[error("Planner content not valid JSON: {0}")]
    InvalidContent(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl PlannerError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PlannerError::Network(e) => e.is_timeout() || e.is_connect(),
            PlannerError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// First `max` characters of `s`, for error messages.
pub(crate) fn excerpt(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
