use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use fusion_domain::error::Result;
use fusion_domain::knowledge::KnowledgeEntry;
use fusion_domain::store::KnowledgeStore;

fn entry_key(user_id: &str, domain: &str, key: &str) -> String {
    format!("{user_id}\u{1f}{domain}\u{1f}{key}")
}

#[derive(Default, Serialize, Deserialize)]
struct Entries(HashMap<String, KnowledgeEntry>);

/// File-backed `KnowledgeStore` (spec §4.14), same fast-path-read /
/// flush-on-write shape as [`crate::stores::FileTokenStore`].
pub struct FileKnowledgeStore {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl FileKnowledgeStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Entries::default()
        };
        Ok(Self { path, entries: RwLock::new(entries) })
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries.read().0)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for FileKnowledgeStore {
    async fn set(&self, entry: KnowledgeEntry) -> Result<()> {
        let key = entry_key(&entry.user_id, &entry.domain, &entry.key);
        self.entries.write().0.insert(key, entry);
        self.flush()
    }

    async fn get(&self, user_id: &str, domain: &str, key: &str) -> Result<Option<KnowledgeEntry>> {
        Ok(self.entries.read().0.get(&entry_key(user_id, domain, key)).cloned())
    }

    async fn delete(&self, user_id: &str, domain: &str, key: &str) -> Result<()> {
        self.entries.write().0.remove(&entry_key(user_id, domain, key));
        self.flush()
    }

    async fn list(&self, user_id: &str, domain: Option<&str>) -> Result<Vec<KnowledgeEntry>> {
        Ok(self
            .entries
            .read()
            .0
            .values()
            .filter(|e| e.user_id == user_id && domain.map(|d| d == e.domain).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileKnowledgeStore::open(dir.path().join("knowledge.json")).unwrap();
        store.set(KnowledgeEntry::new("u1", "notes", "k1", "hello")).await.unwrap();
        let loaded = store.get("u1", "notes", "k1").await.unwrap().unwrap();
        assert_eq!(loaded.content, "hello");
    }

    #[tokio::test]
    async fn list_filters_by_domain() {
        let dir = TempDir::new().unwrap();
        let store = FileKnowledgeStore::open(dir.path().join("knowledge.json")).unwrap();
        store.set(KnowledgeEntry::new("u1", "a", "k1", "x")).await.unwrap();
        store.set(KnowledgeEntry::new("u1", "b", "k2", "y")).await.unwrap();
        let all = store.list("u1", None).await.unwrap();
        assert_eq!(all.len(), 2);
        let filtered = store.list("u1", Some("a")).await.unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn distinct_users_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = FileKnowledgeStore::open(dir.path().join("knowledge.json")).unwrap();
        store.set(KnowledgeEntry::new("u1", "a", "k1", "x")).await.unwrap();
        store.set(KnowledgeEntry::new("u2", "a", "k1", "y")).await.unwrap();
        assert_eq!(store.get("u1", "a", "k1").await.unwrap().unwrap().content, "x");
        assert_eq!(store.get("u2", "a", "k1").await.unwrap().unwrap().content, "y");
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let dir = TempDir::new().unwrap();
        let store = FileKnowledgeStore::open(dir.path().join("knowledge.json")).unwrap();
        store.set(KnowledgeEntry::new("u1", "a", "k1", "x")).await.unwrap();
        store.delete("u1", "a", "k1").await.unwrap();
        assert!(store.get("u1", "a", "k1").await.unwrap().is_none());
    }
}
