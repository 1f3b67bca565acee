use async_trait::async_trait;

use fusion_domain::config::{AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

use crate::traits::AuthStrategy;

/// No-op strategy for `type: "none"` services. The manager short-circuits
/// before ever calling this (spec §4.8 step 1) — it exists so the registry
/// stays total over `AuthType`.
#[derive(Debug, Default)]
pub struct NoneStrategy;

#[async_trait]
impl AuthStrategy for NoneStrategy {
    async fn authenticate(&self, _ctx: &TenantContext, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Err(Error::Authentication {
            auth_type: "none".into(),
            service: String::new(),
            message: "auth type \"none\" never authenticates".into(),
            cause: None,
        })
    }

    fn apply_auth(&self, _req: &mut OutboundRequest, _token: &TokenInfo, _cfg: &AuthConfig) {}

    async fn refresh_token(&self, _ctx: &TenantContext, token: &TokenInfo, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Ok(token.clone())
    }

    fn auth_type(&self) -> AuthType {
        AuthType::None
    }

    fn supports_refresh(&self) -> bool {
        false
    }
}
