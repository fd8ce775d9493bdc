//! Mapping between [`JobRecord`] and its hash fields.
//!
//! Structured fields are stored as JSON strings. Reads are best-effort: a
//! corrupt field degrades to its empty default instead of failing the read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clipchat_models::{ChatMessage, ClipRecord, EditTarget, JobId, JobKind, JobRecord, JobStatus};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::QueueResult;
use crate::kv::Field;

pub const ID: &str = "id";
pub const SOURCE_REF: &str = "sourceRef";
pub const LEGACY_SOURCE_REF: &str = "youtubeUrl";
pub const STATUS: &str = "status";
pub const ERROR: &str = "error";
pub const CREATED_AT: &str = "createdAt";
pub const CONFIG: &str = "config";
pub const MESSAGES: &str = "messages";
pub const CLIPS: &str = "clips";
pub const KIND: &str = "kind";
pub const PARENT_JOB_ID: &str = "parentJobId";
pub const PARENT_CLIP_INDEX: &str = "parentClipIndex";
pub const USER_PROMPT: &str = "userPrompt";
pub const GENERATION: &str = "generation";

/// Every field of a record, for the initial write.
pub fn encode(record: &JobRecord) -> QueueResult<Vec<Field<'static>>> {
    let mut fields = vec![
        (ID, record.id.to_string()),
        (SOURCE_REF, record.source_ref.clone()),
        (STATUS, record.status.as_str().to_string()),
        (ERROR, record.error.clone()),
        (CREATED_AT, record.created_at.timestamp_millis().to_string()),
        (CONFIG, serde_json::to_string(&record.config)?),
        (MESSAGES, serde_json::to_string(&record.messages)?),
        (CLIPS, serde_json::to_string(&record.clips)?),
        (KIND, record.kind.as_str().to_string()),
        (GENERATION, record.generation.to_string()),
    ];

    if let Some(edit) = &record.edit {
        fields.push((PARENT_JOB_ID, edit.parent_job_id.to_string()));
        fields.push((PARENT_CLIP_INDEX, edit.parent_clip_index.to_string()));
        fields.push((USER_PROMPT, edit.user_prompt.clone()));
    }

    Ok(fields)
}

/// Rebuild a record. `None` when the hash has no `id` (absent or partial record).
pub fn decode(fields: &HashMap<String, String>) -> Option<JobRecord> {
    let id = fields.get(ID).map(|s| s.trim()).filter(|s| !s.is_empty())?;
    let id = JobId::from(id);

    let status = match fields.get(STATUS).map(String::as_str).unwrap_or("") {
        "" => JobStatus::Draft,
        raw => raw.parse().unwrap_or_else(|e| {
            warn!(job_id = %id, "Degrading corrupt status field: {}", e);
            JobStatus::Error
        }),
    };

    let created_at = fields
        .get(CREATED_AT)
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let kind = fields
        .get(KIND)
        .map(|s| JobKind::parse_lenient(s))
        .unwrap_or_default();

    let edit = match kind {
        JobKind::Edit => decode_edit_target(fields),
        JobKind::Generate => None,
    };

    Some(JobRecord {
        source_ref: fields
            .get(SOURCE_REF)
            .or_else(|| fields.get(LEGACY_SOURCE_REF))
            .cloned()
            .unwrap_or_default(),
        status,
        error: fields.get(ERROR).cloned().unwrap_or_default(),
        created_at,
        config: safe_json(&id, CONFIG, fields.get(CONFIG), || Value::Object(Default::default())),
        messages: coerce_messages(&safe_json(&id, MESSAGES, fields.get(MESSAGES), || Value::Null)),
        clips: decode_clips(&id, fields.get(CLIPS)),
        kind,
        edit,
        generation: fields
            .get(GENERATION)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        id,
    })
}

/// Clips as stored. Entries that no longer decode are dropped.
pub fn decode_clips(id: &JobId, raw: Option<&String>) -> Vec<ClipRecord> {
    match safe_json(id, CLIPS, raw, || Value::Null) {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Chat messages from arbitrary client input. Array elements are kept as
/// they are; anything but an array is empty.
pub fn coerce_messages(value: &Value) -> Vec<ChatMessage> {
    match value {
        Value::Array(items) => items.iter().cloned().map(ChatMessage::from).collect(),
        _ => Vec::new(),
    }
}

fn decode_edit_target(fields: &HashMap<String, String>) -> Option<EditTarget> {
    let parent_job_id = fields.get(PARENT_JOB_ID).filter(|s| !s.is_empty())?;
    let parent_clip_index = fields.get(PARENT_CLIP_INDEX)?.parse().ok()?;
    Some(EditTarget {
        parent_job_id: JobId::from(parent_job_id.as_str()),
        parent_clip_index,
        user_prompt: fields.get(USER_PROMPT).cloned().unwrap_or_default(),
    })
}

fn safe_json<T: DeserializeOwned>(
    id: &JobId,
    field: &str,
    raw: Option<&String>,
    fallback: impl FnOnce() -> T,
) -> T {
    let Some(raw) = raw.map(|s| s.trim()).filter(|s| !s.is_empty()) else {
        return fallback();
    };
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(job_id = %id, field, "Degrading corrupt JSON field: {}", e);
            fallback()
        }
    }
}
