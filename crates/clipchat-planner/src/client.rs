//! MiniMax chat-completion planner.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PlannerConfig;
use crate::error::{excerpt, PlannerError, PlannerResult};
use crate::types::{CompletionMessage, CompletionRequest, PlanRequest, SYSTEM_PROMPT};
use crate::Planner;

/// Planner backed by the MiniMax `chatcompletion_v2` endpoint.
pub struct MiniMaxPlanner {
    http: Client,
    config: PlannerConfig,
}

impl MiniMaxPlanner {
    /// Create a new planner client.
    pub fn new(config: PlannerConfig) -> PlannerResult<Self> {
        if !config.is_configured() {
            return Err(PlannerError::not_configured("MINIMAX_BASE_URL is not set"));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PlannerError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> PlannerResult<Self> {
        Self::new(PlannerConfig::from_env())
    }

    /// One round-trip with the user turn `prompt`.
    async fn complete(&self, prompt: &str) -> PlannerResult<Value> {
        let url = self.config.endpoint();
        let body = CompletionRequest {
            model: &self.config.model,
            messages: vec![
                CompletionMessage::system(SYSTEM_PROMPT),
                CompletionMessage::user(prompt),
            ],
            temperature: self.config.temperature,
        };

        debug!("Sending plan request to {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(PlannerError::Status {
                status: status.as_u16(),
                body: excerpt(&raw, 500),
            });
        }

        parse_completion(&raw)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> PlannerResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = PlannerResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Planner request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Planner for MiniMaxPlanner {
    async fn plan(&self, request: &PlanRequest) -> PlannerResult<Value> {
        let prompt = request.prompt().to_string();
        let config = self.with_retry(|| self.complete(&prompt)).await?;
        info!(
            model = %self.config.model,
            messages = request.messages.len(),
            "Planner returned config"
        );
        Ok(config)
    }
}

/// Pull the structured config out of a completion body.
///
/// Content is looked up at `choices[0].message.content`, then `reply`, then
/// `result`. String content is parsed as JSON, tolerating a markdown fence.
pub(crate) fn parse_completion(raw: &str) -> PlannerResult<Value> {
    let data: Value =
        serde_json::from_str(raw).map_err(|_| PlannerError::NonJson(excerpt(raw, 200)))?;

    let content = [
        data.pointer("/choices/0/message/content"),
        data.get("reply"),
        data.get("result"),
    ]
    .into_iter()
    .flatten()
    .find(|v| !v.is_null())
    .ok_or(PlannerError::MissingContent)?;

    match content {
        Value::String(text) if text.trim().is_empty() => Err(PlannerError::MissingContent),
        Value::String(text) => parse_content(text),
        Value::Bool(false) => Err(PlannerError::MissingContent),
        other => Ok(other.clone()),
    }
}

fn parse_content(text: &str) -> PlannerResult<Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    serde_json::from_str(unfenced).map_err(|_| PlannerError::InvalidContent(excerpt(text, 200)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_lookup_order() {
        let raw = r#"{"choices":[{"message":{"content":"{\"clipCount\":3}"}}],"reply":"{}"}"#;
        assert_eq!(parse_completion(raw).unwrap(), json!({"clipCount": 3}));

        let raw = r#"{"choices":[],"reply":"{\"clipCount\":2}"}"#;
        assert_eq!(parse_completion(raw).unwrap(), json!({"clipCount": 2}));

        let raw = r#"{"result":{"clipCount":1}}"#;
        assert_eq!(parse_completion(raw).unwrap(), json!({"clipCount": 1}));
    }

    #[test]
    fn test_fenced_content() {
        let raw = json!({
            "choices": [{"message": {"content": "```json\n{\"clipCount\": 4}\n```"}}]
        })
        .to_string();
        assert_eq!(parse_completion(&raw).unwrap(), json!({"clipCount": 4}));
    }

    #[test]
    fn test_failures() {
        assert!(matches!(parse_completion("<html>"), Err(PlannerError::NonJson(_))));
        assert!(matches!(parse_completion("{}"), Err(PlannerError::MissingContent)));
        assert!(matches!(
            parse_completion(r#"{"reply":""}"#),
            Err(PlannerError::MissingContent)
        ));
        assert!(matches!(
            parse_completion(r#"{"reply":"three clips please"}"#),
            Err(PlannerError::InvalidContent(_))
        ));
    }

    #[test]
    fn test_requires_base_url() {
        assert!(matches!(
            MiniMaxPlanner::new(PlannerConfig::default()),
            Err(PlannerError::NotConfigured(_))
        ));
    }
}
