//! Process-local [`KvStore`], used for development and tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::QueueResult;
use crate::kv::{Field, KvStore};

#[derive(Default)]
struct MemoryState {
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, VecDeque<String>>,
}

/// In-memory store. Each operation holds the lock for its whole duration,
/// which gives the same per-key atomicity as the Redis binding.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolve Redis-style inclusive indices (negative counts from the tail).
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> QueueResult<HashMap<String, String>> {
        let state = self.state.read().await;
        Ok(state.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: &[Field<'_>]) -> QueueResult<()> {
        let mut state = self.state.write().await;
        let hash = state.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hash_set_guarded(
        &self,
        key: &str,
        guards: &[Field<'_>],
        fields: &[Field<'_>],
    ) -> QueueResult<bool> {
        let mut state = self.state.write().await;
        let hash = state.hashes.entry(key.to_string()).or_default();

        let guards_hold = guards.iter().all(|(field, expected)| {
            hash.get(*field).map(String::as_str).unwrap_or("") == expected.as_str()
        });
        if !guards_hold {
            return Ok(false);
        }

        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(true)
    }

    async fn list_push_front(&self, key: &str, value: &str) -> QueueResult<u64> {
        let mut state = self.state.write().await;
        let list = state.lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());
        Ok(list.len() as u64)
    }

    async fn list_push_front_bounded(&self, key: &str, value: &str, bound: usize) -> QueueResult<()> {
        let mut state = self.state.write().await;
        let list = state.lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());
        list.truncate(bound.max(1));
        Ok(())
    }

    async fn list_pop_back(&self, key: &str) -> QueueResult<Option<String>> {
        let mut state = self.state.write().await;
        Ok(state.lists.get_mut(key).and_then(VecDeque::pop_back))
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>> {
        let state = self.state.read().await;
        let Some(list) = state.lists.get(key) else {
            return Ok(Vec::new());
        };
        let Some((start, stop)) = resolve_range(list.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(list.range(start..=stop).cloned().collect())
    }

    async fn list_len(&self, key: &str) -> QueueResult<u64> {
        let state = self.state.read().await;
        Ok(state.lists.get(key).map(|l| l.len() as u64).unwrap_or(0))
    }

    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}

/// Memory store whose first `n` list pushes fail, for retry tests.
#[cfg(test)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failures_left: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl FlakyStore {
    pub(crate) fn failing_pushes(n: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures_left: std::sync::atomic::AtomicU32::new(n),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl KvStore for FlakyStore {
    async fn hash_get_all(&self, key: &str) -> QueueResult<HashMap<String, String>> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_set(&self, key: &str, fields: &[Field<'_>]) -> QueueResult<()> {
        self.inner.hash_set(key, fields).await
    }

    async fn hash_set_guarded(
        &self,
        key: &str,
        guards: &[Field<'_>],
        fields: &[Field<'_>],
    ) -> QueueResult<bool> {
        self.inner.hash_set_guarded(key, guards, fields).await
    }

    async fn list_push_front(&self, key: &str, value: &str) -> QueueResult<u64> {
        use std::sync::atomic::Ordering;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(crate::error::QueueError::store("connection reset"));
        }
        self.inner.list_push_front(key, value).await
    }

    async fn list_push_front_bounded(&self, key: &str, value: &str, bound: usize) -> QueueResult<()> {
        self.inner.list_push_front_bounded(key, value, bound).await
    }

    async fn list_pop_back(&self, key: &str) -> QueueResult<Option<String>> {
        self.inner.list_pop_back(key).await
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>> {
        self.inner.list_range(key, start, stop).await
    }

    async fn list_len(&self, key: &str) -> QueueResult<u64> {
        self.inner.list_len(key).await
    }

    async fn ping(&self) -> QueueResult<()> {
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, 0, 2), Some((0, 2)));
        assert_eq!(resolve_range(5, 0, 99), Some((0, 4)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(3, 4, 9), None);
    }

    #[tokio::test]
    async fn test_guarded_set_compares_missing_as_empty() {
        let store = MemoryStore::new();
        assert!(store
            .hash_set_guarded("h", &[("status", String::new())], &[("status", "queued".into())])
            .await
            .unwrap());
        assert!(!store
            .hash_set_guarded("h", &[("status", "draft".into())], &[("status", "done".into())])
            .await
            .unwrap());
        assert_eq!(store.hash_get_all("h").await.unwrap()["status"], "queued");
    }

    #[tokio::test]
    async fn test_bounded_push_keeps_newest() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.list_push_front_bounded("l", &i.to_string(), 3).await.unwrap();
        }
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), vec!["4", "3", "2"]);
    }
}
