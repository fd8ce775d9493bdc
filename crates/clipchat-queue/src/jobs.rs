//! Job record storage and client-side status transitions.

use std::collections::HashMap;
use std::sync::Arc;

use clipchat_models::{ChatMessage, ClipRecord, JobEvent, JobId, JobRecord};
use serde_json::Value;
use tracing::{debug, info};

use crate::codec;
use crate::config::KeySpace;
use crate::error::{QueueError, QueueResult};
use crate::history::HistoryIndex;
use crate::kv::{Field, KvStore};

/// Guarded writes give up after this many lost races.
const MAX_WRITE_ATTEMPTS: usize = 8;

/// Message stored when a failure arrives without one.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Job failed";

/// CRUD over job records, one hash per job.
///
/// Status changes go through [`JobStore::transition`]: read, check the event
/// against the state machine, then write guarded on the observed status and
/// generation. A lost race re-reads and re-checks.
#[derive(Clone)]
pub struct JobStore {
    kv: Arc<dyn KvStore>,
    keys: KeySpace,
    history: HistoryIndex,
}

impl JobStore {
    pub fn new(kv: Arc<dyn KvStore>, keys: KeySpace, history: HistoryIndex) -> Self {
        Self { kv, keys, history }
    }

    pub fn history(&self) -> &HistoryIndex {
        &self.history
    }

    /// Create a draft job for `source_ref` and record it in history.
    pub async fn create(&self, source_ref: &str) -> QueueResult<JobRecord> {
        let source_ref = source_ref.trim();
        if source_ref.is_empty() {
            return Err(QueueError::validation("sourceRef required"));
        }

        let record = JobRecord::draft(source_ref);
        self.insert(&record).await?;
        info!(job_id = %record.id, "Created job");
        Ok(record)
    }

    /// Write a new record, then make it visible in history.
    pub(crate) async fn insert(&self, record: &JobRecord) -> QueueResult<()> {
        let fields = codec::encode(record)?;
        self.kv.hash_set(&self.keys.job(&record.id), &fields).await?;
        self.history.record(&record.id).await
    }

    pub async fn get(&self, id: &JobId) -> QueueResult<JobRecord> {
        self.find(id).await?.ok_or_else(|| QueueError::not_found(id))
    }

    /// Like [`get`](Self::get) but absence is `None`.
    pub async fn find(&self, id: &JobId) -> QueueResult<Option<JobRecord>> {
        Ok(self.load(id).await?.map(|(_, record)| record))
    }

    /// Resolve the `limit` most recent history ids, skipping ids that no
    /// longer resolve.
    pub async fn recent(&self, limit: usize) -> QueueResult<Vec<JobRecord>> {
        let ids = self.history.list(limit).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.find(&id).await? {
                Some(record) => records.push(record),
                None => debug!(job_id = %id, "Skipping history entry without a record"),
            }
        }
        Ok(records)
    }

    /// Replace the chat messages. Anything but an array stores an empty list.
    pub async fn set_messages(&self, id: &JobId, messages: &Value) -> QueueResult<Vec<ChatMessage>> {
        if self.load(id).await?.is_none() {
            return Err(QueueError::not_found(id));
        }

        let messages = codec::coerce_messages(messages);
        let field = [(codec::MESSAGES, serde_json::to_string(&messages)?)];
        self.kv.hash_set(&self.keys.job(id), &field).await?;
        debug!(job_id = %id, count = messages.len(), "Stored messages");
        Ok(messages)
    }

    /// Store a fresh plan and queue the job, clearing any previous error.
    pub async fn set_plan(
        &self,
        id: &JobId,
        config: Value,
        messages: Vec<ChatMessage>,
    ) -> QueueResult<JobRecord> {
        let config_json = serde_json::to_string(&config)?;
        let messages_json = serde_json::to_string(&messages)?;

        let mut record = self
            .transition(id, JobEvent::Plan, |_| {
                Ok(vec![
                    (codec::CONFIG, config_json.clone()),
                    (codec::MESSAGES, messages_json.clone()),
                    (codec::ERROR, String::new()),
                ])
            })
            .await?;

        record.config = config;
        record.messages = messages;
        record.error.clear();
        Ok(record)
    }

    /// Queue the job again with its current plan.
    pub async fn mark_queued(&self, id: &JobId) -> QueueResult<JobRecord> {
        let mut record = self
            .transition(id, JobEvent::Requeue, |_| Ok(vec![(codec::ERROR, String::new())]))
            .await?;
        record.error.clear();
        Ok(record)
    }

    /// Record a planning failure on the job.
    pub async fn mark_failed(&self, id: &JobId, message: &str) -> QueueResult<JobRecord> {
        let message = failure_message(message);
        let mut record = self
            .transition(id, JobEvent::PlanFailed, |_| Ok(vec![(codec::ERROR, message.clone())]))
            .await?;
        record.error = message;
        Ok(record)
    }

    /// Apply `event` to the job's status.
    ///
    /// `fields` is called with the record as observed on each attempt, before
    /// the event is checked, and returns the extra fields to write alongside
    /// the new status; an error from it aborts the transition. Returns the observed record with the
    /// new status and generation applied (other written fields are not).
    pub(crate) async fn transition<F>(
        &self,
        id: &JobId,
        event: JobEvent,
        mut fields: F,
    ) -> QueueResult<JobRecord>
    where
        F: FnMut(&JobRecord) -> QueueResult<Vec<Field<'static>>>,
    {
        let key = self.keys.job(id);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (raw, mut record) = self
                .load(id)
                .await?
                .ok_or_else(|| QueueError::not_found(id))?;

            let mut update = fields(&record)?;
            let next = record.status.apply(event)?;
            let generation = if event.starts_generation() {
                record.generation + 1
            } else {
                record.generation
            };

            update.push((codec::STATUS, next.as_str().to_string()));
            update.push((codec::GENERATION, generation.to_string()));

            let guards = [
                (codec::STATUS, raw_field(&raw, codec::STATUS)),
                (codec::GENERATION, raw_field(&raw, codec::GENERATION)),
            ];

            if self.kv.hash_set_guarded(&key, &guards, &update).await? {
                info!(
                    job_id = %id,
                    from = %record.status,
                    to = %next,
                    %event,
                    generation,
                    "Job transitioned"
                );
                record.status = next;
                record.generation = generation;
                return Ok(record);
            }

            debug!(job_id = %id, %event, attempt, "Lost a concurrent update, retrying");
        }

        Err(QueueError::contention(format!(
            "{} on job {} kept racing concurrent writers",
            event, id
        )))
    }

    /// Read-modify-write of the clip list, guarded on the stored clips.
    ///
    /// `edit` returns whether it changed anything; `false` skips the write.
    pub(crate) async fn update_clips<F>(&self, id: &JobId, mut edit: F) -> QueueResult<Vec<ClipRecord>>
    where
        F: FnMut(&mut Vec<ClipRecord>) -> QueueResult<bool>,
    {
        let key = self.keys.job(id);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (raw, record) = self
                .load(id)
                .await?
                .ok_or_else(|| QueueError::not_found(id))?;

            let mut clips = record.clips;
            if !edit(&mut clips)? {
                return Ok(clips);
            }

            let guards = [(codec::CLIPS, raw_field(&raw, codec::CLIPS))];
            let update = [(codec::CLIPS, serde_json::to_string(&clips)?)];
            if self.kv.hash_set_guarded(&key, &guards, &update).await? {
                return Ok(clips);
            }

            debug!(job_id = %id, attempt, "Clips changed underneath, retrying");
        }

        Err(QueueError::contention(format!(
            "clip update on job {} kept racing concurrent writers",
            id
        )))
    }

    async fn load(&self, id: &JobId) -> QueueResult<Option<(HashMap<String, String>, JobRecord)>> {
        let raw = self.kv.hash_get_all(&self.keys.job(id)).await?;
        Ok(codec::decode(&raw).map(|record| (raw, record)))
    }
}

pub(crate) fn failure_message(message: &str) -> String {
    let message = message.trim();
    if message.is_empty() {
        DEFAULT_FAILURE_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

fn raw_field(raw: &HashMap<String, String>, field: &str) -> String {
    raw.get(field).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use clipchat_models::JobStatus;
    use serde_json::json;

    fn store_with(kv: Arc<dyn KvStore>, bound: usize) -> JobStore {
        let keys = KeySpace::default();
        let history = HistoryIndex::new(kv.clone(), keys.history(), bound);
        JobStore::new(kv, keys, history)
    }

    fn store() -> JobStore {
        store_with(Arc::new(MemoryStore::new()), 200)
    }

    #[tokio::test]
    async fn test_create_returns_distinct_drafts() {
        let jobs = store();
        let a = jobs.create("https://example/video").await.unwrap();
        let b = jobs.create("https://example/video").await.unwrap();
        assert_ne!(a.id, b.id);

        let fetched = jobs.get(&a.id).await.unwrap();
        assert_eq!(fetched.status, JobStatus::Draft);
        assert!(fetched.clips.is_empty());
        assert_eq!(fetched.source_ref, "https://example/video");
        assert_eq!(jobs.history().list(10).await.unwrap(), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_create_requires_source_ref() {
        let err = store().create("   ").await.unwrap_err();
        assert!(matches!(err, QueueError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_and_partial_records_are_not_found() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        kv.hash_set("job:partial", &[("status", "queued".into())]).await.unwrap();
        let jobs = store_with(kv, 200);

        assert!(jobs.get(&JobId::from("nope")).await.unwrap_err().is_not_found());
        assert!(jobs.get(&JobId::from("partial")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_set_messages_coerces_non_arrays() {
        let jobs = store();
        let job = jobs.create("src").await.unwrap();

        let stored = jobs
            .set_messages(&job.id, &json!([{"role": "user", "content": "3 clips"}]))
            .await
            .unwrap();
        assert_eq!(stored, vec![ChatMessage::user("3 clips")]);

        jobs.set_messages(&job.id, &json!("not a list")).await.unwrap();
        assert!(jobs.get(&job.id).await.unwrap().messages.is_empty());

        let err = jobs.set_messages(&JobId::from("nope"), &json!([])).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_messages_stores_turns_verbatim() {
        let jobs = store();
        let job = jobs.create("src").await.unwrap();
        let messages = json!([
            {"role": "user", "content": "3 clips"},
            {"role": "user", "content": [{"type": "text", "text": "vertical"}]},
            {"role": "user", "content": "short", "ts": 17}
        ]);

        jobs.set_messages(&job.id, &messages).await.unwrap();

        let stored = jobs.get(&job.id).await.unwrap().messages;
        assert_eq!(stored.len(), 3);
        assert_eq!(serde_json::to_value(&stored).unwrap(), messages);
    }

    #[tokio::test]
    async fn test_set_plan_queues_and_bumps_generation() {
        let jobs = store();
        let job = jobs.create("src").await.unwrap();

        let planned = jobs
            .set_plan(&job.id, json!({"clipCount": 3}), vec![ChatMessage::user("3 clips")])
            .await
            .unwrap();
        assert_eq!(planned.status, JobStatus::Queued);
        assert_eq!(planned.generation, 1);

        let fetched = jobs.get(&job.id).await.unwrap();
        assert_eq!(fetched.status, JobStatus::Queued);
        assert_eq!(fetched.config["clipCount"], 3);
        assert_eq!(fetched.messages.len(), 1);
        assert_eq!(fetched.generation, 1);
    }

    #[tokio::test]
    async fn test_mark_failed_then_requeue_clears_error() {
        let jobs = store();
        let job = jobs.create("src").await.unwrap();

        jobs.mark_failed(&job.id, "").await.unwrap();
        let failed = jobs.get(&job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.error, DEFAULT_FAILURE_MESSAGE);

        jobs.mark_queued(&job.id).await.unwrap();
        let queued = jobs.get(&job.id).await.unwrap();
        assert_eq!(queued.status, JobStatus::Queued);
        assert!(queued.error.is_empty());
    }

    #[tokio::test]
    async fn test_requeue_rejected_while_processing() {
        let jobs = store();
        let job = jobs.create("src").await.unwrap();
        jobs.mark_queued(&job.id).await.unwrap();
        jobs.transition(&job.id, JobEvent::Claim, |_| Ok(Vec::new()))
            .await
            .unwrap();

        let err = jobs.mark_queued(&job.id).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition(_)));
        assert_eq!(jobs.get(&job.id).await.unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_history_bound() {
        let jobs = store_with(Arc::new(MemoryStore::new()), 10);
        let mut created = Vec::new();
        for i in 0..15 {
            created.push(jobs.create(&format!("src-{i}")).await.unwrap().id);
        }

        let listed: Vec<JobId> = jobs.recent(20).await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(listed.len(), 10);
        let expected: Vec<JobId> = created.iter().rev().take(10).cloned().collect();
        assert_eq!(listed, expected);
        for oldest in &created[..5] {
            assert!(!listed.contains(oldest));
        }
    }

    #[tokio::test]
    async fn test_recent_skips_unresolvable_ids() {
        let jobs = store();
        let job = jobs.create("src").await.unwrap();
        jobs.history().record(&JobId::from("ghost")).await.unwrap();

        let recent = jobs.recent(50).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, job.id);
    }

    #[tokio::test]
    async fn test_update_clips_skips_write_when_unchanged() {
        let jobs = store();
        let job = jobs.create("src").await.unwrap();
        let clips = jobs.update_clips(&job.id, |_| Ok(false)).await.unwrap();
        assert!(clips.is_empty());

        let clips = jobs
            .update_clips(&job.id, |clips| {
                clips.push(ClipRecord::new("a.mp4", 0.0, 5.0, "Clip 1"));
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(clips.len(), 1);
        assert_eq!(jobs.get(&job.id).await.unwrap().clips.len(), 1);
    }
}
