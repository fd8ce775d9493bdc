//! Job store and work queue for ClipChat.
//!
//! Job records, the work queue and the history list live in a key-value
//! store ([`RedisStore`] in production, [`MemoryStore`] for development and
//! tests). On top of it:
//! - [`JobStore`]: job records and client-side status transitions
//! - [`WorkQueue`]: FIFO of job ids for the external worker
//! - [`HistoryIndex`]: bounded most-recent-first list of job ids
//! - [`RevisionChain`]: edit jobs and the clip revisions they produce
//! - [`WorkerGateway`]: claim/report contract for the worker

pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod jobs;
pub mod kv;
pub mod memory;
pub mod queue;
pub mod redis_store;
pub mod revision;
pub mod worker;

use std::sync::Arc;

use tracing::info;

pub use config::{KeySpace, StoreBackend, StoreConfig, DEFAULT_HISTORY_LIMIT};
pub use error::{QueueError, QueueResult};
pub use history::HistoryIndex;
pub use jobs::{JobStore, DEFAULT_FAILURE_MESSAGE};
pub use kv::KvStore;
pub use memory::MemoryStore;
pub use queue::WorkQueue;
pub use redis_store::RedisStore;
pub use revision::{RevisionChain, RevisionOutcome, RevisionOutput};
pub use worker::{ApplyOutcome, Claim, JobResult, WorkerGateway};

/// Open the configured store and check that it answers.
pub async fn connect(config: &StoreConfig) -> QueueResult<Arc<dyn KvStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let store = RedisStore::new(&config.redis_url)?;
            store
                .init()
                .await
                .map_err(|e| QueueError::store(format!("Redis not reachable: {}", e)))?;
            Ok(Arc::new(store))
        }
    }
}

/// Every component wired to one shared store.
#[derive(Clone)]
pub struct JobCore {
    pub jobs: JobStore,
    pub queue: WorkQueue,
    pub history: HistoryIndex,
    pub revisions: RevisionChain,
    pub worker: WorkerGateway,
    store: Arc<dyn KvStore>,
}

impl JobCore {
    pub fn new(store: Arc<dyn KvStore>, config: &StoreConfig) -> Self {
        let keys = config.keys.clone();
        let history = HistoryIndex::new(store.clone(), keys.history(), config.history_limit);
        let queue = WorkQueue::new(store.clone(), keys.queue());
        let jobs = JobStore::new(store.clone(), keys, history.clone());
        let revisions = RevisionChain::new(jobs.clone(), queue.clone());
        let worker = WorkerGateway::new(jobs.clone(), queue.clone(), revisions.clone());

        Self {
            jobs,
            queue,
            history,
            revisions,
            worker,
            store,
        }
    }

    /// The underlying store, for health checks.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipchat_models::{ClipRecord, JobStatus, NewEditJob};
    use serde_json::json;

    /// create → messages → plan → worker done → edit → revision attached.
    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let core = JobCore::new(Arc::new(MemoryStore::new()), &StoreConfig::memory(200));

        let j1 = core.jobs.create("https://example/video").await.unwrap();
        assert_eq!(j1.status, JobStatus::Draft);

        let messages = json!([{"role": "user", "content": "3 clips"}]);
        core.jobs.set_messages(&j1.id, &messages).await.unwrap();
        let stored = core.jobs.get(&j1.id).await.unwrap();
        assert_eq!(serde_json::to_value(&stored.messages).unwrap(), messages);

        core.jobs
            .set_plan(&j1.id, json!({"clipCount": 3}), stored.messages.clone())
            .await
            .unwrap();
        core.queue.enqueue(&j1.id).await.unwrap();
        let planned = core.jobs.get(&j1.id).await.unwrap();
        assert_eq!(planned.status, JobStatus::Queued);
        assert_eq!(planned.config["clipCount"], 3);

        let Claim::Claimed(claimed) = core.worker.claim_next().await.unwrap() else {
            panic!("expected a claim");
        };
        core.worker
            .apply_result(
                &claimed.id,
                JobResult::done(vec![ClipRecord::new("a.mp4", 0.0, 5.0, "Clip 1")]),
            )
            .await
            .unwrap();
        assert_eq!(core.jobs.get(&j1.id).await.unwrap().clips.len(), 1);

        let j2 = core
            .revisions
            .create_edit(&NewEditJob::new(j1.id.as_str(), 0, "add captions"))
            .await
            .unwrap();
        let Claim::Claimed(edit) = core.worker.claim_next().await.unwrap() else {
            panic!("expected the edit job");
        };
        assert_eq!(edit.id, j2.id);
        core.worker
            .attach_revision(&j2.id, RevisionOutput::new("a-v2.mp4"))
            .await
            .unwrap();

        assert_eq!(core.jobs.get(&j1.id).await.unwrap().clips[0].revisions.len(), 1);
        assert_eq!(core.jobs.get(&j2.id).await.unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let store = connect(&StoreConfig::memory(10)).await.unwrap();
        store.ping().await.unwrap();
    }
}
