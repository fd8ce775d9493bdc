//! Bounded, most-recent-first index of job ids.

use std::sync::Arc;

use clipchat_models::JobId;

use crate::error::QueueResult;
use crate::kv::KvStore;

/// History list. Purely a presentation index: an id here does not imply the
/// record still exists, and readers skip ids that fail to resolve.
#[derive(Clone)]
pub struct HistoryIndex {
    kv: Arc<dyn KvStore>,
    key: String,
    bound: usize,
}

impl HistoryIndex {
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>, bound: usize) -> Self {
        Self {
            kv,
            key: key.into(),
            bound: bound.max(1),
        }
    }

    /// Maximum number of ids retained.
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Insert at the front, evicting from the tail past the bound.
    pub async fn record(&self, id: &JobId) -> QueueResult<()> {
        self.kv
            .list_push_front_bounded(&self.key, id.as_str(), self.bound)
            .await
    }

    /// Up to `limit` most recent ids, newest first. Never more than the bound.
    pub async fn list(&self, limit: usize) -> QueueResult<Vec<JobId>> {
        let limit = limit.min(self.bound);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let ids = self.kv.list_range(&self.key, 0, limit as isize - 1).await?;
        Ok(ids.into_iter().map(JobId::from).collect())
    }

    pub async fn len(&self) -> QueueResult<u64> {
        self.kv.list_len(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_list_is_newest_first_and_bounded() {
        let history = HistoryIndex::new(Arc::new(MemoryStore::new()), "jobs:history", 3);
        for id in ["a", "b", "c", "d", "e"] {
            history.record(&JobId::from(id)).await.unwrap();
        }

        let ids = history.list(10).await.unwrap();
        assert_eq!(ids, vec![JobId::from("e"), JobId::from("d"), JobId::from("c")]);
        assert_eq!(history.list(2).await.unwrap().len(), 2);
        assert!(history.list(0).await.unwrap().is_empty());
        assert_eq!(history.len().await.unwrap(), 3);
    }
}
