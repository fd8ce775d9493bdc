//! Key-value store binding.
//!
//! The core only needs a mapping-of-mappings (one hash per job) and a few
//! ordered lists, reachable by exact key. Every operation here is atomic on
//! its own; nothing spans more than one key.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::QueueResult;

/// A field name paired with a value.
pub type Field<'a> = (&'a str, String);

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read every field of a hash. A missing key reads as an empty map.
    async fn hash_get_all(&self, key: &str) -> QueueResult<HashMap<String, String>>;

    /// Set fields of a hash in one write.
    async fn hash_set(&self, key: &str, fields: &[Field<'_>]) -> QueueResult<()>;

    /// Set `fields` only if every guard field currently equals its expected
    /// value (a missing field reads as the empty string). Returns whether the
    /// write happened.
    async fn hash_set_guarded(
        &self,
        key: &str,
        guards: &[Field<'_>],
        fields: &[Field<'_>],
    ) -> QueueResult<bool>;

    /// Insert at the head of a list, returning the new length.
    async fn list_push_front(&self, key: &str, value: &str) -> QueueResult<u64>;

    /// Insert at the head and trim the tail so at most `bound` entries remain.
    async fn list_push_front_bounded(&self, key: &str, value: &str, bound: usize) -> QueueResult<()>;

    /// Remove and return the tail entry.
    async fn list_pop_back(&self, key: &str) -> QueueResult<Option<String>>;

    /// Entries `start..=stop` counted from the head (negative counts from the tail).
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>>;

    async fn list_len(&self, key: &str) -> QueueResult<u64>;

    /// Round-trip to the store.
    async fn ping(&self) -> QueueResult<()>;
}
