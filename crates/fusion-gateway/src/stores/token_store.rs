use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use fusion_domain::error::Result;
use fusion_domain::store::{APITokenStore, TokenStore};
use fusion_domain::token::TokenInfo;

fn tenant_key(tenant_hash: &str, service: &str) -> String {
    format!("{tenant_hash}:{service}")
}

/// SHA-256 hex digest of an opaque API token blob — spec §3 "API tokens:
/// opaque blob + derived hash used as tenantHash".
pub fn derive_tenant_hash(bearer_token: &str) -> String {
    hex::encode(Sha256::digest(bearer_token.as_bytes()))
}

/// `RwLock<HashMap<…>>` fast-path read / flush-on-write persistence, one
/// JSON file per store instance.
pub struct FileTokenStore {
    path: PathBuf,
    tokens: RwLock<HashMap<String, TokenInfo>>,
}

impl FileTokenStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tokens = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };
        Ok(Self { path, tokens: RwLock::new(tokens) })
    }

    fn flush(&self) -> Result<()> {
        let snapshot = self.tokens.read().clone();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, tenant_hash: &str, service: &str) -> Result<Option<TokenInfo>> {
        Ok(self.tokens.read().get(&tenant_key(tenant_hash, service)).cloned())
    }

    async fn set(&self, tenant_hash: &str, service: &str, token: &TokenInfo) -> Result<()> {
        self.tokens.write().insert(tenant_key(tenant_hash, service), token.clone());
        self.flush()
    }

    async fn delete(&self, tenant_hash: &str, service: &str) -> Result<()> {
        self.tokens.write().remove(&tenant_key(tenant_hash, service));
        self.flush()
    }
}

#[derive(Default, Serialize, Deserialize)]
struct RegisteredTenants(HashSet<String>);

/// Resolves the caller's own bearer token (presented against the gateway,
/// not an upstream service) to the `tenantHash` it was registered under
/// (spec §4.8 `ExtractTenantFromToken`). Registration is an out-of-band
/// admin operation; this store only knows which derived hashes are valid.
pub struct FileApiTokenStore {
    path: PathBuf,
    registered: RwLock<RegisteredTenants>,
}

impl FileApiTokenStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let registered = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            RegisteredTenants::default()
        };
        Ok(Self { path, registered: RwLock::new(registered) })
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.registered.read().0)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Admin provisioning: registers a new opaque bearer token, returning
    /// the `tenantHash` callers will present it as.
    pub fn register(&self, bearer_token: &str) -> Result<String> {
        let tenant_hash = derive_tenant_hash(bearer_token);
        self.registered.write().0.insert(tenant_hash.clone());
        self.flush()?;
        Ok(tenant_hash)
    }

    pub fn revoke(&self, tenant_hash: &str) -> Result<()> {
        self.registered.write().0.remove(tenant_hash);
        self.flush()
    }
}

#[async_trait]
impl APITokenStore for FileApiTokenStore {
    async fn resolve_tenant_hash(&self, bearer_token: &str) -> Result<Option<String>> {
        let candidate = derive_tenant_hash(bearer_token);
        if self.registered.read().0.contains(&candidate) {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }
}
