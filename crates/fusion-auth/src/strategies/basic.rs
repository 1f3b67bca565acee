use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use fusion_domain::config::{config_str, AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

use crate::traits::AuthStrategy;

/// `username` + `password` → `Authorization: Basic base64(user:pass)`.
/// No refresh (spec §4.7).
#[derive(Debug, Default)]
pub struct BasicStrategy;

fn credentials(cfg: &AuthConfig) -> Result<(String, String)> {
    let username = config_str(&cfg.config, "username", "username").ok_or_else(|| Error::Authentication {
        auth_type: "basic".into(),
        service: String::new(),
        message: "basic auth config must set \"username\"".into(),
        cause: None,
    })?;
    let password = config_str(&cfg.config, "password", "password").ok_or_else(|| Error::Authentication {
        auth_type: "basic".into(),
        service: String::new(),
        message: "basic auth config must set \"password\"".into(),
        cause: None,
    })?;
    Ok((username.to_string(), password.to_string()))
}

#[async_trait]
impl AuthStrategy for BasicStrategy {
    async fn authenticate(&self, _ctx: &TenantContext, cfg: &AuthConfig) -> Result<TokenInfo> {
        let (username, password) = credentials(cfg)?;
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        Ok(TokenInfo::new(encoded))
    }

    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, _cfg: &AuthConfig) {
        req.set_header("Authorization", format!("Basic {}", token.access_token));
    }

    async fn refresh_token(&self, _ctx: &TenantContext, token: &TokenInfo, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Ok(token.clone())
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Basic
    }

    fn supports_refresh(&self) -> bool {
        false
    }
}
