//! Keyed TTL cache (spec §4.6), with in-memory, file-backed,
//! database-delegating, and no-op implementations behind one trait.

pub mod db_backed;
pub mod file;
pub mod keys;
pub mod memory;
pub mod noop;

use async_trait::async_trait;
use std::time::Duration;

use fusion_domain::error::Result;

/// Cache contract every implementation satisfies. Reads/writes against a
/// given key are linearizable (spec §5).
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
    async fn clear(&self) -> Result<()>;
}

pub use db_backed::DbBackedCache;
pub use file::FileCache;
pub use memory::MemoryCache;
pub use noop::NoopCache;
