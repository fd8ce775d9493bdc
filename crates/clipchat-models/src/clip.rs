//! Clip output records and their revision history.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One output artifact of a generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    /// Location of the produced media
    pub url: String,
    /// Start offset into the source (seconds)
    pub start: f64,
    /// End offset into the source (seconds)
    pub end: f64,
    /// Short label
    #[serde(default)]
    pub title: String,
    /// Re-generated versions, oldest first. Only ever appended to.
    #[serde(default)]
    pub revisions: Vec<ClipRevision>,
}

impl ClipRecord {
    pub fn new(url: impl Into<String>, start: f64, end: f64, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start,
            end,
            title: title.into(),
            revisions: Vec::new(),
        }
    }

    /// Clip duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Check the `0 <= start < end` extent invariant.
    pub fn has_valid_extent(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.start < self.end
    }

    /// Whether an edit job already attached a revision to this clip.
    pub fn has_revision_from(&self, edit_job_id: &str) -> bool {
        self.revisions
            .iter()
            .any(|r| r.edit_job_id.as_deref() == Some(edit_job_id))
    }

    /// The most recent media for this clip: the latest revision if any.
    pub fn latest_url(&self) -> &str {
        self.revisions.last().map(|r| r.url.as_str()).unwrap_or(&self.url)
    }
}

/// A re-generated version of a clip produced by an edit job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipRevision {
    pub url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schemars(with = "i64")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub note: String,
    /// Edit job that produced this revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_job_id: Option<String>,
}
