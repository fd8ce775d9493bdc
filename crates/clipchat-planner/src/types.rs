//! Planner request types and the chat-completion wire format.

use clipchat_models::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the planner is asked to plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// Input media reference
    pub source_ref: String,
    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessage>,
}

impl PlanRequest {
    pub fn new(source_ref: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            source_ref: source_ref.into(),
            messages,
        }
    }

    /// The JSON object sent as the user turn.
    pub fn prompt(&self) -> Value {
        serde_json::json!({
            "task": "Plan short vertical clips cut from the source video, following the conversation.",
            "sourceRef": self.source_ref,
            "messages": self.messages,
            "output": {
                "clipCount": "integer, number of clips to cut",
                "targetDurationSeconds": "number, preferred clip length",
                "captions": {
                    "enabled": "boolean",
                    "style": "string, caption look",
                },
                "notes": "string, anything else the editor asked for",
            },
        })
    }
}

pub(crate) const SYSTEM_PROMPT: &str =
    "You are a strict JSON generator. Return JSON only. No markdown. No extra text.";

#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<CompletionMessage>,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionMessage {
    pub role: &'static str,
    pub name: &'static str,
    pub content: String,
}

impl CompletionMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            name: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            name: "user",
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_conversation() {
        let request = PlanRequest::new("https://example/video", vec![ChatMessage::user("3 clips")]);
        let prompt = request.prompt();
        assert_eq!(prompt["sourceRef"], "https://example/video");
        assert_eq!(prompt["messages"][0]["content"], "3 clips");
    }
}
