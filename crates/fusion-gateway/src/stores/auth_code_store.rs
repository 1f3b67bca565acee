use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use fusion_domain::error::Result;
use fusion_domain::store::AuthCodeStore;

#[derive(Clone, Serialize, Deserialize)]
struct CodeRecord {
    tenant_hash: String,
    service: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct Codes(HashMap<String, CodeRecord>);

/// One-shot auth codes backing the `{service}_auth_setup` flow (spec §4.15):
/// `create` binds a code to `(tenantHash, service)` for 15 minutes,
/// `resolve` consumes it — a code is valid for exactly one redemption.
pub struct FileAuthCodeStore {
    path: PathBuf,
    codes: RwLock<Codes>,
}

impl FileAuthCodeStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let codes = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Codes::default()
        };
        Ok(Self { path, codes: RwLock::new(codes) })
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.codes.read().0)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl AuthCodeStore for FileAuthCodeStore {
    async fn create(&self, code: &str, tenant_hash: &str, service: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.codes.write().0.insert(
            code.to_string(),
            CodeRecord { tenant_hash: tenant_hash.to_string(), service: service.to_string(), expires_at },
        );
        self.flush()
    }

    async fn resolve(&self, code: &str) -> Result<Option<(String, String)>> {
        let record = self.codes.write().0.remove(code);
        self.flush()?;
        match record {
            Some(r) if r.expires_at > Utc::now() => Ok(Some((r.tenant_hash, r.service))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_then_resolve_returns_tenant_and_service() {
        let dir = TempDir::new().unwrap();
        let store = FileAuthCodeStore::open(dir.path().join("codes.json")).unwrap();
        store.create("code1", "tenant-a", "graph", Utc::now() + chrono::Duration::minutes(15)).await.unwrap();
        let resolved = store.resolve("code1").await.unwrap();
        assert_eq!(resolved, Some(("tenant-a".to_string(), "graph".to_string())));
    }

    #[tokio::test]
    async fn resolve_is_one_shot() {
        let dir = TempDir::new().unwrap();
        let store = FileAuthCodeStore::open(dir.path().join("codes.json")).unwrap();
        store.create("code1", "tenant-a", "graph", Utc::now() + chrono::Duration::minutes(15)).await.unwrap();
        assert!(store.resolve("code1").await.unwrap().is_some());
        assert!(store.resolve("code1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_code_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        let store = FileAuthCodeStore::open(dir.path().join("codes.json")).unwrap();
        store.create("code1", "tenant-a", "graph", Utc::now() - chrono::Duration::seconds(1)).await.unwrap();
        assert!(store.resolve("code1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_code_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        let store = FileAuthCodeStore::open(dir.path().join("codes.json")).unwrap();
        assert!(store.resolve("ghost").await.unwrap().is_none());
    }
}
