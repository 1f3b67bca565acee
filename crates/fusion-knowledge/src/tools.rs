//! `knowledge_set` / `knowledge_get` / `knowledge_delete` tool handlers
//! (spec §4.14). All three require a resolved `user_id` on the calling
//! `TenantContext`; anonymous/no-auth callers get `Error::Authentication`,
//! matching the shape `fusion-auth`'s strategies use for credential
//! failures.

use std::sync::Arc;

use serde_json::{Map, Value};

use fusion_domain::error::{Error, Result};
use fusion_domain::knowledge::KnowledgeEntry;
use fusion_domain::store::KnowledgeStore;
use fusion_domain::tenant::TenantContext;

fn require_user_id(ctx: &TenantContext) -> Result<&str> {
    ctx.user_id.as_deref().ok_or_else(|| Error::Authentication {
        auth_type: "knowledge".to_string(),
        service: ctx.service_name.clone(),
        message: "knowledge tools require a resolved user id".to_string(),
        cause: None,
    })
}

fn string_arg(args: &Map<String, Value>, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn required_string_arg(args: &Map<String, Value>, name: &str) -> Result<String> {
    string_arg(args, name).ok_or_else(|| Error::validation(name, "", "required", format!("{name} is required")))
}

/// Dispatches the three knowledge tools against any `KnowledgeStore` impl.
/// Owns no state of its own; the gateway wires in the concrete store.
pub struct KnowledgeHandler {
    store: Arc<dyn KnowledgeStore>,
}

impl KnowledgeHandler {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn set(&self, ctx: &TenantContext, args: Map<String, Value>) -> Result<String> {
        let user_id = require_user_id(ctx)?;
        let domain = required_string_arg(&args, "domain")?;
        let key = required_string_arg(&args, "key")?;
        let content = required_string_arg(&args, "content")?;

        let entry = match self.store.get(user_id, &domain, &key).await? {
            Some(mut existing) => {
                existing.content = content;
                existing.updated_at = chrono::Utc::now();
                existing
            }
            None => KnowledgeEntry::new(user_id, domain, key, content),
        };
        self.store.set(entry).await?;
        Ok("ok".to_string())
    }

    pub async fn get(&self, ctx: &TenantContext, args: Map<String, Value>) -> Result<String> {
        let user_id = require_user_id(ctx)?;
        let domain = string_arg(&args, "domain");
        let key = string_arg(&args, "key");

        let entries = match (domain.as_deref(), key.as_deref()) {
            (Some(domain), Some(key)) => match self.store.get(user_id, domain, key).await? {
                Some(entry) => vec![entry],
                None => Vec::new(),
            },
            (Some(domain), None) => self.store.list(user_id, Some(domain)).await?,
            (None, _) => self.store.list(user_id, None).await?,
        };

        Ok(serde_json::to_string(&entries)?)
    }

    pub async fn delete(&self, ctx: &TenantContext, args: Map<String, Value>) -> Result<String> {
        let user_id = require_user_id(ctx)?;
        let domain = required_string_arg(&args, "domain")?;
        let key = required_string_arg(&args, "key")?;
        self.store.delete(user_id, &domain, &key).await?;
        Ok("ok".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeKnowledgeStore {
        entries: Mutex<HashMap<(String, String, String), KnowledgeEntry>>,
    }

    #[async_trait]
    impl KnowledgeStore for FakeKnowledgeStore {
        async fn set(&self, entry: KnowledgeEntry) -> Result<()> {
            self.entries
                .lock()
                .insert((entry.user_id.clone(), entry.domain.clone(), entry.key.clone()), entry);
            Ok(())
        }

        async fn get(&self, user_id: &str, domain: &str, key: &str) -> Result<Option<KnowledgeEntry>> {
            Ok(self.entries.lock().get(&(user_id.to_string(), domain.to_string(), key.to_string())).cloned())
        }

        async fn delete(&self, user_id: &str, domain: &str, key: &str) -> Result<()> {
            self.entries.lock().remove(&(user_id.to_string(), domain.to_string(), key.to_string()));
            Ok(())
        }

        async fn list(&self, user_id: &str, domain: Option<&str>) -> Result<Vec<KnowledgeEntry>> {
            Ok(self
                .entries
                .lock()
                .values()
                .filter(|e| e.user_id == user_id && domain.map(|d| d == e.domain).unwrap_or(true))
                .cloned()
                .collect())
        }
    }

    fn ctx_with_user(user_id: &str) -> TenantContext {
        let mut ctx = TenantContext::new_no_auth("svc", "req-1");
        ctx.tenant_hash = "a".repeat(64);
        ctx.user_id = Some(user_id.to_string());
        ctx
    }

    fn args(pairs: &[(&str, &str)]) -> Map<String, Value> {
        let mut m = Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), Value::String(v.to_string()));
        }
        m
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let handler = KnowledgeHandler::new(Arc::new(FakeKnowledgeStore::default()));
        let ctx = ctx_with_user("user-1");
        handler.set(&ctx, args(&[("domain", "notes"), ("key", "k1"), ("content", "hello")])).await.unwrap();
        let result = handler.get(&ctx, args(&[("domain", "notes"), ("key", "k1")])).await.unwrap();
        assert!(result.contains("hello"));
    }

    #[tokio::test]
    async fn get_with_no_selectors_lists_everything_for_user() {
        let handler = KnowledgeHandler::new(Arc::new(FakeKnowledgeStore::default()));
        let ctx = ctx_with_user("user-1");
        handler.set(&ctx, args(&[("domain", "a"), ("key", "k1"), ("content", "x")])).await.unwrap();
        handler.set(&ctx, args(&[("domain", "b"), ("key", "k2"), ("content", "y")])).await.unwrap();
        let result = handler.get(&ctx, Map::new()).await.unwrap();
        let parsed: Vec<KnowledgeEntry> = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn get_with_domain_only_filters_to_domain() {
        let handler = KnowledgeHandler::new(Arc::new(FakeKnowledgeStore::default()));
        let ctx = ctx_with_user("user-1");
        handler.set(&ctx, args(&[("domain", "a"), ("key", "k1"), ("content", "x")])).await.unwrap();
        handler.set(&ctx, args(&[("domain", "b"), ("key", "k2"), ("content", "y")])).await.unwrap();
        let result = handler.get(&ctx, args(&[("domain", "a")])).await.unwrap();
        let parsed: Vec<KnowledgeEntry> = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].domain, "a");
    }

    #[tokio::test]
    async fn get_with_both_selectors_set_but_missing_returns_empty() {
        let handler = KnowledgeHandler::new(Arc::new(FakeKnowledgeStore::default()));
        let ctx = ctx_with_user("user-1");
        let result = handler.get(&ctx, args(&[("domain", "a"), ("key", "missing")])).await.unwrap();
        let parsed: Vec<KnowledgeEntry> = serde_json::from_str(&result).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn no_auth_context_is_rejected() {
        let handler = KnowledgeHandler::new(Arc::new(FakeKnowledgeStore::default()));
        let ctx = TenantContext::new_no_auth("svc", "req-1");
        let result = handler.set(&ctx, args(&[("domain", "a"), ("key", "k"), ("content", "x")])).await;
        assert!(matches!(result, Err(Error::Authentication { .. })));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let handler = KnowledgeHandler::new(Arc::new(FakeKnowledgeStore::default()));
        let ctx = ctx_with_user("user-1");
        handler.set(&ctx, args(&[("domain", "a"), ("key", "k1"), ("content", "x")])).await.unwrap();
        handler.delete(&ctx, args(&[("domain", "a"), ("key", "k1")])).await.unwrap();
        let result = handler.get(&ctx, args(&[("domain", "a"), ("key", "k1")])).await.unwrap();
        let parsed: Vec<KnowledgeEntry> = serde_json::from_str(&result).unwrap();
        assert!(parsed.is_empty());
    }
}
