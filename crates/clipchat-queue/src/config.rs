//! Store configuration and key layout.

use clipchat_models::JobId;

/// Default number of ids kept in the history list.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Which store binding to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    /// Process-local store, for development and tests
    Memory,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL (`rediss://` for TLS endpoints)
    pub redis_url: String,
    /// Store binding
    pub backend: StoreBackend,
    /// Maximum length of the history list
    pub history_limit: usize,
    /// Key layout
    pub keys: KeySpace,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            backend: StoreBackend::Redis,
            history_limit: DEFAULT_HISTORY_LIMIT,
            keys: KeySpace::default(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let backend = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Redis,
        };

        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            backend,
            history_limit: std::env::var("HISTORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_HISTORY_LIMIT),
            keys: std::env::var("STORE_KEY_PREFIX")
                .map(KeySpace::with_prefix)
                .unwrap_or_default(),
        }
    }

    /// In-memory config with a custom history bound.
    pub fn memory(history_limit: usize) -> Self {
        Self {
            backend: StoreBackend::Memory,
            history_limit,
            ..Self::default()
        }
    }
}

/// Names of the keys this crate reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Namespace every key under `prefix` (a trailing `:` is added).
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with(':') {
            prefix.push(':');
        }
        Self { prefix }
    }

    /// Hash holding one job record.
    pub fn job(&self, id: &JobId) -> String {
        format!("{}job:{}", self.prefix, id)
    }

    /// Bounded most-recent-first list of job ids.
    pub fn history(&self) -> String {
        format!("{}jobs:history", self.prefix)
    }

    /// Pending job ids.
    pub fn queue(&self) -> String {
        format!("{}jobs:queue", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys() {
        let keys = KeySpace::default();
        assert_eq!(keys.job(&JobId::from("abc")), "job:abc");
        assert_eq!(keys.history(), "jobs:history");
        assert_eq!(keys.queue(), "jobs:queue");
    }

    #[test]
    fn test_prefixed_keys() {
        let keys = KeySpace::with_prefix("staging");
        assert_eq!(keys.job(&JobId::from("abc")), "staging:job:abc");
        assert_eq!(KeySpace::with_prefix("staging:").queue(), "staging:jobs:queue");
    }
}
