//! FIFO list of job ids awaiting the worker.

use std::sync::Arc;
use std::time::Duration;

use clipchat_models::JobId;
use tracing::{debug, warn};

use crate::error::QueueResult;
use crate::kv::KvStore;

/// Pushes are attempted this many times before giving up.
pub const ENQUEUE_ATTEMPTS: u32 = 3;

/// Work queue. Ids are pushed at the head and popped from the tail, so pop
/// order is enqueue order. Duplicates are allowed.
#[derive(Clone)]
pub struct WorkQueue {
    kv: Arc<dyn KvStore>,
    key: String,
}

impl WorkQueue {
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    /// Push an id. Returns the queue length after the push.
    pub async fn enqueue(&self, id: &JobId) -> QueueResult<u64> {
        let len = self.kv.list_push_front(&self.key, id.as_str()).await?;
        debug!(job_id = %id, queue_len = len, "Enqueued job");
        Ok(len)
    }

    /// [`enqueue`](Self::enqueue), retried with a short linear backoff on
    /// store failures. A job left `queued` after the last attempt fails is
    /// pushed again by a requeue.
    pub async fn enqueue_with_retry(&self, id: &JobId) -> QueueResult<u64> {
        let mut attempt = 1;
        loop {
            match self.enqueue(id).await {
                Ok(len) => return Ok(len),
                Err(e) if attempt < ENQUEUE_ATTEMPTS && e.is_store_failure() => {
                    warn!(job_id = %id, attempt, "Enqueue failed, retrying: {}", e);
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove and return the oldest id.
    pub async fn dequeue(&self) -> QueueResult<Option<JobId>> {
        let id = self.kv.list_pop_back(&self.key).await?;
        Ok(id.map(JobId::from))
    }

    pub async fn len(&self) -> QueueResult<u64> {
        self.kv.list_len(&self.key).await
    }

    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FlakyStore, MemoryStore};

    #[tokio::test]
    async fn test_fifo_with_duplicates() {
        let queue = WorkQueue::new(Arc::new(MemoryStore::new()), "jobs:queue");
        for id in ["a", "b", "a"] {
            queue.enqueue(&JobId::from(id)).await.unwrap();
        }
        assert_eq!(queue.len().await.unwrap(), 3);

        let mut popped = Vec::new();
        while let Some(id) = queue.dequeue().await.unwrap() {
            popped.push(id.0);
        }
        assert_eq!(popped, vec!["a", "b", "a"]);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_enqueue_retries_store_failures() {
        let queue = WorkQueue::new(Arc::new(FlakyStore::failing_pushes(2)), "jobs:queue");
        assert_eq!(queue.enqueue_with_retry(&JobId::from("a")).await.unwrap(), 1);

        let queue = WorkQueue::new(Arc::new(FlakyStore::failing_pushes(ENQUEUE_ATTEMPTS)), "jobs:queue");
        let err = queue.enqueue_with_retry(&JobId::from("a")).await.unwrap_err();
        assert!(err.is_store_failure());
        assert!(queue.is_empty().await.unwrap());
    }
}
