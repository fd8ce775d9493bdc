//! HTTP client for the ClipChat API.
//!
//! [`ApiClient`] covers every `/api` route. [`JobPoller`] follows a single
//! job until the worker finishes it.

pub mod client;
pub mod config;
pub mod error;
pub mod poller;

pub use client::ApiClient;
pub use config::PollerConfig;
pub use error::{ClientError, ClientResult};
pub use poller::JobPoller;
