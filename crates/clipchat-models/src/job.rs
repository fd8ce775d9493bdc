//! Job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::{ClipRecord, JobStatus};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Distinguishes originating jobs from edit jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Produces a fresh clip set from a source
    #[default]
    Generate,
    /// Produces one revision of a clip of another job
    Edit,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Generate => "generate",
            JobKind::Edit => "edit",
        }
    }

    /// Parse a persisted kind; anything unrecognized is an originating job.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "edit" => JobKind::Edit,
            _ => JobKind::Generate,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversational turn, kept exactly as the client sent it.
///
/// Turns are usually `{role, content}` objects, but content may be
/// structured and clients may attach extra fields, so the value is stored
/// whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ChatMessage(serde_json::Value);

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self(serde_json::json!({ "role": "user", "content": content.into() }))
    }

    /// The `role` field, when it is a string.
    pub fn role(&self) -> Option<&str> {
        self.0.get("role").and_then(serde_json::Value::as_str)
    }

    /// The `content` field, or null.
    pub fn content(&self) -> &serde_json::Value {
        self.0.get("content").unwrap_or(&serde_json::Value::Null)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for ChatMessage {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// The clip an edit job revises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditTarget {
    pub parent_job_id: JobId,
    pub parent_clip_index: usize,
    pub user_prompt: String,
}

/// A unit of work, as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    /// Input media reference (URL). Empty for edit jobs.
    pub source_ref: String,
    pub status: JobStatus,
    /// Failure description; empty unless `status` is `error`
    pub error: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schemars(with = "i64")]
    pub created_at: DateTime<Utc>,
    /// Planner output; an empty object until planning completes
    pub config: serde_json::Value,
    pub messages: Vec<ChatMessage>,
    pub clips: Vec<ClipRecord>,
    pub kind: JobKind,
    /// Present for edit jobs only
    #[serde(flatten)]
    pub edit: Option<EditTarget>,
    /// Bumped every time the job (re-)enters the queue
    #[serde(default)]
    pub generation: u64,
}

impl JobRecord {
    /// A fresh draft for `source_ref`.
    pub fn draft(source_ref: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            source_ref: source_ref.into(),
            status: JobStatus::Draft,
            error: String::new(),
            created_at: Utc::now(),
            config: serde_json::Value::Object(Default::default()),
            messages: Vec::new(),
            clips: Vec::new(),
            kind: JobKind::Generate,
            edit: None,
            generation: 0,
        }
    }

    /// A fresh edit job, born queued.
    pub fn edit(target: EditTarget) -> Self {
        Self {
            status: JobStatus::Queued,
            kind: JobKind::Edit,
            edit: Some(target),
            generation: 1,
            ..Self::draft("")
        }
    }

    pub fn is_edit(&self) -> bool {
        self.kind == JobKind::Edit
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Input for creating an edit job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct NewEditJob {
    #[validate(length(min = 1, message = "parentJobId required"))]
    pub parent_job_id: String,
    #[validate(required(message = "parentClipIndex required"))]
    #[serde(alias = "clipIndex")]
    pub parent_clip_index: Option<usize>,
    #[validate(length(min = 1, message = "userPrompt required"))]
    pub user_prompt: String,
}

impl NewEditJob {
    pub fn new(parent_job_id: impl Into<String>, parent_clip_index: usize, user_prompt: impl Into<String>) -> Self {
        Self {
            parent_job_id: parent_job_id.into(),
            parent_clip_index: Some(parent_clip_index),
            user_prompt: user_prompt.into(),
        }
    }

    /// The target, once validated.
    pub fn target(&self) -> Option<EditTarget> {
        Some(EditTarget {
            parent_job_id: JobId::from(self.parent_job_id.trim()),
            parent_clip_index: self.parent_clip_index?,
            user_prompt: self.user_prompt.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_keeps_structured_content() {
        let raw = json!({"role": "user", "content": [{"type": "text", "text": "vertical"}], "ts": 17});
        let message: ChatMessage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(message.role(), Some("user"));
        assert_eq!(message.content()[0]["text"], "vertical");
        assert_eq!(serde_json::to_value(&message).unwrap(), raw);
    }

    #[test]
    fn test_draft_defaults() {
        let job = JobRecord::draft("https://example/video");
        assert_eq!(job.status, JobStatus::Draft);
        assert_eq!(job.config, serde_json::json!({}));
        assert!(job.messages.is_empty());
        assert!(job.clips.is_empty());
        assert!(job.error.is_empty());
        assert!(!job.is_edit());
    }

    #[test]
    fn test_edit_job_projection() {
        let job = JobRecord::edit(EditTarget {
            parent_job_id: JobId::from("parent-1"),
            parent_clip_index: 2,
            user_prompt: "white captions".into(),
        });
        assert_eq!(job.status, JobStatus::Queued);

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["kind"], "edit");
        assert_eq!(value["parentJobId"], "parent-1");
        assert_eq!(value["parentClipIndex"], 2);
        assert_eq!(value["userPrompt"], "white captions");
        assert_eq!(value["sourceRef"], "");
    }

    #[test]
    fn test_generate_job_has_no_edit_fields() {
        let value = serde_json::to_value(JobRecord::draft("src")).unwrap();
        assert!(value.get("parentJobId").is_none());
        assert!(value["createdAt"].is_i64());
    }

    #[test]
    fn test_new_edit_validation() {
        assert!(NewEditJob::new("parent", 0, "make it pop").validate().is_ok());
        assert!(NewEditJob::new("", 0, "make it pop").validate().is_err());
        assert!(NewEditJob::new("parent", 0, "").validate().is_err());

        let missing_index = NewEditJob {
            parent_job_id: "parent".into(),
            parent_clip_index: None,
            user_prompt: "x".into(),
        };
        assert!(missing_index.validate().is_err());
        assert!(missing_index.target().is_none());
    }
}
