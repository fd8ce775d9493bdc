//! Axum HTTP API server for ClipChat.
//!
//! This crate provides:
//! - Job creation, planning and generation endpoints
//! - Edit jobs against existing clips
//! - Bounded job history
//! - Per-IP rate limiting and Prometheus metrics

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{GenerationService, PlanInput};
pub use state::AppState;
