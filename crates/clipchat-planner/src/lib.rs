//! Planner collaborator for ClipChat.
//!
//! A planner turns the accumulated chat messages of a job into the
//! structured config the media worker runs with. The config is opaque to
//! the rest of the system.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

pub use client::MiniMaxPlanner;
pub use config::PlannerConfig;
pub use error::{PlannerError, PlannerResult};
pub use types::PlanRequest;

/// Turns a conversation into job config.
///
/// Any failure (transport, status, malformed body, missing content) is a
/// [`PlannerError`]; callers must not have written anything before the call
/// returns successfully.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &PlanRequest) -> PlannerResult<Value>;
}

/// Stand-in used when no planner service is configured. Every call fails,
/// so only requests that supply their own config succeed.
#[derive(Debug, Clone)]
pub struct DisabledPlanner {
    reason: String,
}

impl DisabledPlanner {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Planner for DisabledPlanner {
    async fn plan(&self, _request: &PlanRequest) -> PlannerResult<Value> {
        Err(PlannerError::not_configured(self.reason.clone()))
    }
}

/// The configured planner, or a [`DisabledPlanner`] explaining why not.
pub fn from_env() -> Box<dyn Planner> {
    match MiniMaxPlanner::from_env() {
        Ok(planner) => Box::new(planner),
        Err(e) => {
            tracing::warn!("Planner disabled: {}", e);
            Box::new(DisabledPlanner::new(e.to_string()))
        }
    }
}
