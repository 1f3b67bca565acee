use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use fusion_domain::error::Result;

use crate::Cache;

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-memory cache with a background sweeper that evicts expired entries
/// every 5 minutes (spec §4.6).
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        let entries = Arc::new(RwLock::new(HashMap::new()));
        Self { entries }
    }

    /// Spawns the periodic sweeper on the current Tokio runtime. Separate
    /// from `new` so tests can construct a cache without a sweeper task.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let entries = self.entries.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5 * 60));
            loop {
                interval.tick().await;
                let now = Utc::now();
                let before = entries.read().len();
                entries.write().retain(|_, e| e.expires_at > now);
                let evicted = before - entries.read().len();
                if evicted > 0 {
                    tracing::debug!(evicted, "memory cache sweep evicted expired entries");
                }
            }
        });
    }

    fn sweep_one(&self, key: &str) {
        let expired = self
            .entries
            .read()
            .get(key)
            .map(|e| e.expires_at <= Utc::now())
            .unwrap_or(false);
        if expired {
            self.entries.write().remove(key);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.sweep_one(key);
        Ok(self.entries.read().get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(0));
        self.entries.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn get_miss_returns_none() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_access() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let cache = MemoryCache::new();
        cache.set("a", "1", Duration::from_secs(60)).await.unwrap();
        cache.set("b", "2", Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();
        assert!(!cache.has("a").await.unwrap());
        assert!(!cache.has("b").await.unwrap());
    }
}
