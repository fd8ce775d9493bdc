//! Planner client configuration.

use std::time::Duration;

pub const DEFAULT_MODEL: &str = "MiniMax-M2.5";

/// Configuration for [`MiniMaxPlanner`](crate::MiniMaxPlanner).
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Base URL of the chat-completion service
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
    /// Retries on timeouts, connection failures and 5xx/429
    pub max_retries: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
            max_retries: 1,
        }
    }
}

impl PlannerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("MINIMAX_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            api_key: std::env::var("MINIMAX_API_KEY").unwrap_or_default(),
            model: std::env::var("MINIMAX_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: 0.2,
            timeout: Duration::from_secs(
                std::env::var("PLANNER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("PLANNER_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }

    /// Whether enough is set to reach the service.
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// Chat-completion endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/v1/text/chatcompletion_v2", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.model, "MiniMax-M2.5");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(!config.is_configured());
    }

    #[test]
    fn test_endpoint() {
        let config = PlannerConfig {
            base_url: "https://api.minimax.example".into(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint(),
            "https://api.minimax.example/v1/text/chatcompletion_v2"
        );
    }
}
