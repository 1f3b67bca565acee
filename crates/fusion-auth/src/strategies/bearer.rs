use async_trait::async_trait;

use fusion_domain::config::{config_str, AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

use crate::traits::AuthStrategy;

/// Static token from config or an env var, applied as
/// `Authorization: Bearer <t>`. No refresh (spec §4.7).
#[derive(Debug, Default)]
pub struct BearerStrategy;

fn resolve_token(cfg: &AuthConfig) -> Result<String> {
    if let Some(token) = config_str(&cfg.config, "token", "token") {
        return Ok(token.to_string());
    }
    if let Some(env_var) = config_str(&cfg.config, "tokenEnv", "token_env") {
        return std::env::var(env_var).map_err(|_| Error::Authentication {
            auth_type: "bearer".into(),
            service: String::new(),
            message: format!("environment variable {env_var} referenced by tokenEnv is not set"),
            cause: None,
        });
    }
    Err(Error::Authentication {
        auth_type: "bearer".into(),
        service: String::new(),
        message: "bearer auth config must set \"token\" or \"tokenEnv\"".into(),
        cause: None,
    })
}

#[async_trait]
impl AuthStrategy for BearerStrategy {
    async fn authenticate(&self, _ctx: &TenantContext, cfg: &AuthConfig) -> Result<TokenInfo> {
        Ok(TokenInfo::new(resolve_token(cfg)?))
    }

    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, _cfg: &AuthConfig) {
        req.set_header("Authorization", format!("Bearer {}", token.access_token));
    }

    async fn refresh_token(&self, _ctx: &TenantContext, token: &TokenInfo, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Ok(token.clone())
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Bearer
    }

    fn supports_refresh(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> TenantContext {
        TenantContext::new_no_auth("svc", "req-1")
    }

    #[tokio::test]
    async fn authenticates_with_static_token() {
        let cfg = AuthConfig {
            auth_type: AuthType::Bearer,
            config: json!({"token": "T"}),
            ..Default::default()
        };
        let token = BearerStrategy.authenticate(&ctx(), &cfg).await.unwrap();
        assert_eq!(token.access_token, "T");
    }

    #[tokio::test]
    async fn applies_authorization_header() {
        let token = TokenInfo::new("T");
        let mut req = OutboundRequest::new("GET", "https://api.example.com/ping");
        BearerStrategy.apply_auth(&mut req, &token, &AuthConfig::default());
        assert!(req.headers.contains(&("Authorization".to_string(), "Bearer T".to_string())));
    }

    #[tokio::test]
    async fn missing_token_is_an_error() {
        let cfg = AuthConfig {
            auth_type: AuthType::Bearer,
            config: json!({}),
            ..Default::default()
        };
        assert!(BearerStrategy.authenticate(&ctx(), &cfg).await.is_err());
    }
}
