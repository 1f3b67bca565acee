use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use fusion_domain::error::Result;
use fusion_domain::store::TokenStore;
use fusion_domain::token::TokenInfo;

use crate::memory::MemoryCache;
use crate::Cache;

/// Delegates token-shaped keys (`tenant:{hash}:token:{service}`) to the
/// external `TokenStore`; every other key falls back to an in-process
/// `MemoryCache` (spec §4.6 "database-backed": "delegates to the external
/// TokenStore for OAuth tokens; other keys are still in-memory").
pub struct DbBackedCache {
    store: Arc<dyn TokenStore>,
    fallback: MemoryCache,
}

impl DbBackedCache {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            fallback: MemoryCache::new(),
        }
    }
}

fn parse_token_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("tenant:")?;
    let (hash, rest) = rest.split_once(":token:")?;
    Some((hash, rest))
}

#[async_trait]
impl Cache for DbBackedCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match parse_token_key(key) {
            Some((hash, service)) => {
                let token = self.store.get(hash, service).await?;
                Ok(token.map(|t| serde_json::to_string(&t)).transpose()?)
            }
            None => self.fallback.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        match parse_token_key(key) {
            Some((hash, service)) => {
                let token: TokenInfo = serde_json::from_str(value)?;
                self.store.set(hash, service, &token).await
            }
            None => self.fallback.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match parse_token_key(key) {
            Some((hash, service)) => self.store.delete(hash, service).await,
            None => self.fallback.delete(key).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        self.fallback.clear().await
    }
}
