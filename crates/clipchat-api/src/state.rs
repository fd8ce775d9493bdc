//! Application state.

use std::sync::Arc;

use clipchat_planner::Planner;
use clipchat_queue::{JobCore, QueueResult, StoreConfig};

use crate::config::ApiConfig;
use crate::middleware::ClientRateLimiter;
use crate::services::GenerationService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub core: JobCore,
    pub generation: GenerationService,
    /// Per-IP limiter for the `/api` routes
    pub rate_limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    /// Connect to the configured store and build the state.
    pub async fn new(
        config: ApiConfig,
        store_config: &StoreConfig,
        planner: Arc<dyn Planner>,
    ) -> QueueResult<Self> {
        let store = clipchat_queue::connect(store_config).await?;
        Ok(Self::from_parts(config, JobCore::new(store, store_config), planner))
    }

    /// Build the state around an existing core.
    pub fn from_parts(config: ApiConfig, core: JobCore, planner: Arc<dyn Planner>) -> Self {
        let generation = GenerationService::new(core.jobs.clone(), core.queue.clone(), planner);
        let rate_limiter = Arc::new(ClientRateLimiter::new(config.rate_limit_rps));
        Self {
            config,
            core,
            generation,
            rate_limiter,
        }
    }
}
