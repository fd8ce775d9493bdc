//! Client configuration.

use std::time::Duration;

/// Connection and polling settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// API base URL, without the `/api` suffix
    pub base_url: String,
    /// Delay between job reads
    pub interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PollerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CLIPCHAT_API_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            interval: Duration::from_millis(
                std::env::var("POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            timeout: Duration::from_secs(
                std::env::var("CLIENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}
