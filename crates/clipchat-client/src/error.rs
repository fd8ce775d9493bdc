//! Client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx answer, with the server's `{error}` message when present
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// `generate?replan` ran but the planner failed; the job is now `error`
    #[error("Planning failed: {0}")]
    PlanFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }

    /// Whether polling again could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Network(e) => e.is_timeout() || e.is_connect(),
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
