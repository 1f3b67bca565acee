//! External collaborator interfaces (spec §1: "the core consumes a
//! `TokenStore + KnowledgeStore + APITokenStore + AuthCodeStore` interface").
//!
//! The core depends only on these traits; `fusion-gateway` ships one
//! concrete in-process implementation of each, but any persistence layer
//! satisfying the trait works.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::knowledge::KnowledgeEntry;
use crate::token::TokenInfo;

/// Persists OAuth/bearer tokens keyed by `(tenant_hash, service_name)`.
/// Spec §8 invariant 3: at most one token per key at any time.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, tenant_hash: &str, service: &str) -> Result<Option<TokenInfo>>;
    async fn set(&self, tenant_hash: &str, service: &str, token: &TokenInfo) -> Result<()>;
    async fn delete(&self, tenant_hash: &str, service: &str) -> Result<()>;
}

/// Per-user key-value knowledge store (spec §4.14).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn set(&self, entry: KnowledgeEntry) -> Result<()>;
    async fn get(&self, user_id: &str, domain: &str, key: &str) -> Result<Option<KnowledgeEntry>>;
    async fn delete(&self, user_id: &str, domain: &str, key: &str) -> Result<()>;
    /// Listing semantics per spec §4.14: both empty selectors list everything
    /// for the user; `domain` alone filters to that domain; `key` requires
    /// `domain` and returns at most one entry.
    async fn list(&self, user_id: &str, domain: Option<&str>) -> Result<Vec<KnowledgeEntry>>;
}

/// Resolves an opaque bearer credential to the tenant hash it was issued
/// under (spec §4.8 `ExtractTenantFromToken`).
#[async_trait]
pub trait APITokenStore: Send + Sync {
    async fn resolve_tenant_hash(&self, bearer_token: &str) -> Result<Option<String>>;
}

/// One-shot, short-lived auth codes binding an out-of-band setup session to
/// a `(tenant_hash, service)` pair (spec §4.15, §6).
#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    async fn create(&self, code: &str, tenant_hash: &str, service: &str, expires_at: DateTime<Utc>) -> Result<()>;
    /// Resolves and consumes (one-shot) the code; `None` if unknown or expired.
    async fn resolve(&self, code: &str) -> Result<Option<(String, String)>>;
}
