use std::collections::HashMap;
use std::sync::Arc;

use fusion_cache::keys::token_cache_key;
use fusion_cache::Cache;
use fusion_domain::config::{AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::store::{APITokenStore, AuthCodeStore, TokenStore};
use fusion_domain::tenant::{TenantContext, NOAUTH};
use fusion_domain::token::TokenInfo;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::registry::AuthStrategyRegistry;

/// Owns the strategy registry, token cache/store, and the per-(tenant,service)
/// lock map (spec §4.8). Exposes `GetToken`/`ApplyAuthentication`/
/// `InvalidateToken`/`RefreshIfPossible`/`ExtractTenantFromToken`/
/// `ExtractTenantFromAuthCode`.
pub struct AuthManager {
    registry: AuthStrategyRegistry,
    cache: Arc<dyn Cache>,
    token_store: Arc<dyn TokenStore>,
    api_token_store: Arc<dyn APITokenStore>,
    auth_code_store: Arc<dyn AuthCodeStore>,
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AuthManager {
    pub fn new(
        registry: AuthStrategyRegistry,
        cache: Arc<dyn Cache>,
        token_store: Arc<dyn TokenStore>,
        api_token_store: Arc<dyn APITokenStore>,
        auth_code_store: Arc<dyn AuthCodeStore>,
    ) -> Self {
        Self {
            registry,
            cache,
            token_store,
            api_token_store,
            auth_code_store,
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &AuthStrategyRegistry {
        &self.registry
    }

    /// Atomically creates-or-loads the per-(tenant,service) lock (spec §5
    /// "the per-(tenant,service) lock map is a concurrent map").
    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks.lock().entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Step 1-6 of spec §4.8. Deliberately does NOT take the per-key lock on
    /// the fast path — two concurrent callers may both observe an expired
    /// token and both refresh; this race is accepted by the spec (§5) since
    /// refresh is idempotent and the last writer wins.
    pub async fn get_token(&self, ctx: &TenantContext, auth_cfg: &AuthConfig) -> Result<Option<TokenInfo>> {
        if auth_cfg.auth_type == AuthType::None {
            return Ok(None);
        }
        let strategy = self.registry.get(auth_cfg.auth_type)?;

        if let Some(token) = self.load_cached(ctx).await? {
            if !token.is_expired() {
                return Ok(Some(token));
            }
            if strategy.supports_refresh() && token.refresh_token.is_some() {
                let refreshed = strategy.refresh_token(ctx, &token, auth_cfg).await.map_err(|e| wrap_auth_error(auth_cfg, ctx, e))?;
                self.store_token(ctx, &refreshed).await?;
                return Ok(Some(refreshed));
            }
        }

        match strategy.authenticate(ctx, auth_cfg).await {
            Ok(token) => {
                self.store_token(ctx, &token).await?;
                Ok(Some(token))
            }
            Err(Error::DeviceCode { user_code, verification_uri, expires_at }) => {
                Err(Error::DeviceCode { user_code, verification_uri, expires_at })
            }
            Err(e) => Err(wrap_auth_error(auth_cfg, ctx, e)),
        }
    }

    /// `GetToken` then `strategy.ApplyAuth` (spec §4.8).
    pub async fn apply_authentication(&self, req: &mut OutboundRequest, ctx: &TenantContext, auth_cfg: &AuthConfig) -> Result<()> {
        let Some(token) = self.get_token(ctx, auth_cfg).await? else {
            return Ok(());
        };
        let strategy = self.registry.get(auth_cfg.auth_type)?;
        strategy.apply_auth(req, &token, auth_cfg);
        Ok(())
    }

    /// Attempts refresh only; never re-authenticates (spec §4.8).
    pub async fn refresh_if_possible(&self, ctx: &TenantContext, auth_cfg: &AuthConfig) -> Result<TokenInfo> {
        let strategy = self.registry.get(auth_cfg.auth_type)?;
        let token = self.load_cached(ctx).await?.ok_or_else(|| Error::Authentication {
            auth_type: auth_cfg.auth_type.as_str().into(),
            service: ctx.service_name.clone(),
            message: "no cached token to refresh".into(),
            cause: None,
        })?;
        if !strategy.supports_refresh() {
            return Err(Error::Authentication {
                auth_type: auth_cfg.auth_type.as_str().into(),
                service: ctx.service_name.clone(),
                message: "strategy does not support refresh".into(),
                cause: None,
            });
        }
        if token.refresh_token.is_none() {
            return Err(Error::Authentication {
                auth_type: auth_cfg.auth_type.as_str().into(),
                service: ctx.service_name.clone(),
                message: "no refresh token present".into(),
                cause: None,
            });
        }
        let refreshed = strategy.refresh_token(ctx, &token, auth_cfg).await.map_err(|e| wrap_auth_error(auth_cfg, ctx, e))?;
        self.store_token(ctx, &refreshed).await?;
        Ok(refreshed)
    }

    /// Deletes from backing store then cache, serialized by the per-key lock
    /// (spec §4.8, §5 ordering guarantee).
    pub async fn invalidate_token(&self, ctx: &TenantContext) -> Result<()> {
        let lock = self.lock_for(&ctx.lock_key());
        let _guard = lock.lock().await;
        self.token_store.delete(&ctx.tenant_hash, &ctx.service_name).await?;
        self.cache.delete(&token_cache_key(&ctx.tenant_hash, &ctx.service_name)).await?;
        tracing::info!(tenant_hash = %ctx.tenant_hash, service = %ctx.service_name, "token invalidated");
        Ok(())
    }

    /// Empty bearer → NOAUTH sentinel context; otherwise resolves through
    /// `APITokenStore` (spec §4.8).
    pub async fn extract_tenant_from_token(&self, bearer: &str, service_name: &str, request_id: &str) -> Result<TenantContext> {
        if bearer.is_empty() {
            return Ok(TenantContext::new_no_auth(service_name, request_id));
        }
        let tenant_hash = self.api_token_store.resolve_tenant_hash(bearer).await?.ok_or_else(|| Error::Authentication {
            auth_type: "bearer".into(),
            service: service_name.into(),
            message: "unrecognized API token".into(),
            cause: None,
        })?;
        Ok(TenantContext {
            tenant_hash,
            service_name: service_name.to_string(),
            user_id: None,
            description: None,
            metadata: HashMap::new(),
            request_id: request_id.to_string(),
            created_at: chrono::Utc::now(),
        })
    }

    /// Resolves a one-time auth code back to `(tenantHash, service)` (spec §4.8, §4.15).
    pub async fn extract_tenant_from_auth_code(&self, code: &str, request_id: &str) -> Result<TenantContext> {
        let (tenant_hash, service_name) = self.auth_code_store.resolve(code).await?.ok_or_else(|| Error::Authentication {
            auth_type: "auth_code".into(),
            service: String::new(),
            message: "unknown or expired auth code".into(),
            cause: None,
        })?;
        Ok(TenantContext {
            tenant_hash,
            service_name,
            user_id: None,
            description: None,
            metadata: HashMap::new(),
            request_id: request_id.to_string(),
            created_at: chrono::Utc::now(),
        })
    }

    /// Completes an `oauth2_external`/`user_credentials` out-of-band setup
    /// flow: resolves the one-shot auth code embedded in the
    /// `fusion-auth <blob>` instruction to its `(tenantHash, service)`,
    /// obtains the credential — an OAuth2 authorization-code exchange, or
    /// the field values the user submitted — and persists it the same way
    /// a normal `authenticate` call would (spec §4.15).
    pub async fn complete_auth_setup(
        &self,
        code: &str,
        request_id: &str,
        auth_cfg: &AuthConfig,
        redirect_uri: &str,
        exchange_code: Option<&str>,
        credential_fields: &[(String, String)],
    ) -> Result<TenantContext> {
        let ctx = self.extract_tenant_from_auth_code(code, request_id).await?;

        let token = match auth_cfg.auth_type {
            AuthType::Oauth2External => {
                let authorization_code = exchange_code.ok_or_else(|| Error::Authentication {
                    auth_type: "oauth2_external".into(),
                    service: ctx.service_name.clone(),
                    message: "oauth2_external setup requires an authorization code".into(),
                    cause: None,
                })?;
                self.registry.oauth2_external().exchange_code(auth_cfg, authorization_code, redirect_uri).await?
            }
            AuthType::UserCredentials => {
                let mut token = TokenInfo::new(String::new());
                for (name, value) in credential_fields {
                    token.metadata.insert(name.clone(), serde_json::Value::String(value.clone()));
                }
                token
            }
            other => {
                return Err(Error::Configuration {
                    field: "auth.type".into(),
                    value: other.as_str().into(),
                    message: "auth-setup completion is only defined for oauth2_external and user_credentials".into(),
                });
            }
        };

        self.store_token(&ctx, &token).await?;
        Ok(ctx)
    }

    async fn load_cached(&self, ctx: &TenantContext) -> Result<Option<TokenInfo>> {
        let key = token_cache_key(&ctx.tenant_hash, &ctx.service_name);
        if let Some(raw) = self.cache.get(&key).await? {
            if let Ok(token) = serde_json::from_str::<TokenInfo>(&raw) {
                return Ok(Some(token));
            }
        }
        self.token_store.get(&ctx.tenant_hash, &ctx.service_name).await
    }

    async fn store_token(&self, ctx: &TenantContext, token: &TokenInfo) -> Result<()> {
        self.token_store.set(&ctx.tenant_hash, &ctx.service_name, token).await?;
        let key = token_cache_key(&ctx.tenant_hash, &ctx.service_name);
        let ttl = token
            .expires_at
            .map(|exp| (exp - chrono::Utc::now()).num_seconds().max(1) as u64)
            .map(std::time::Duration::from_secs)
            .unwrap_or(std::time::Duration::from_secs(3600));
        self.cache.set(&key, &serde_json::to_string(token)?, ttl).await?;
        Ok(())
    }
}

fn wrap_auth_error(auth_cfg: &AuthConfig, ctx: &TenantContext, e: Error) -> Error {
    if matches!(e, Error::DeviceCode { .. }) {
        return e;
    }
    Error::Authentication {
        auth_type: auth_cfg.auth_type.as_str().into(),
        service: ctx.service_name.clone(),
        message: e.to_string(),
        cause: Some(e.to_string()),
    }
}
