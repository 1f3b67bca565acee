use async_trait::async_trait;

use fusion_domain::config::{config_str, AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

use crate::traits::AuthStrategy;

/// Header-named or query-named API key, with an optional value prefix
/// (e.g. `Bearer `, `ApiKey `). No refresh (spec §4.7).
#[derive(Debug, Default)]
pub struct ApiKeyStrategy;

struct Projected {
    key: String,
    location: String,
    name: String,
    prefix: String,
}

fn project(cfg: &AuthConfig) -> Result<Projected> {
    let key = config_str(&cfg.config, "key", "key")
        .or_else(|| config_str(&cfg.config, "apiKey", "api_key"))
        .map(str::to_string)
        .or_else(|| {
            config_str(&cfg.config, "keyEnv", "key_env")
                .and_then(|var| std::env::var(var).ok())
        })
        .ok_or_else(|| Error::Authentication {
            auth_type: "api_key".into(),
            service: String::new(),
            message: "api_key auth config must set \"key\" or \"keyEnv\"".into(),
            cause: None,
        })?;
    let location = config_str(&cfg.config, "in", "in").unwrap_or("header").to_string();
    let name = config_str(&cfg.config, "name", "name").unwrap_or("X-API-Key").to_string();
    let prefix = config_str(&cfg.config, "prefix", "prefix").unwrap_or("").to_string();
    Ok(Projected { key, location, name, prefix })
}

#[async_trait]
impl AuthStrategy for ApiKeyStrategy {
    async fn authenticate(&self, _ctx: &TenantContext, cfg: &AuthConfig) -> Result<TokenInfo> {
        let projected = project(cfg)?;
        Ok(TokenInfo::new(projected.key))
    }

    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, cfg: &AuthConfig) {
        let Ok(projected) = project(cfg) else { return };
        let value = format!("{}{}", projected.prefix, token.access_token);
        match projected.location.as_str() {
            "query" => req.set_query(projected.name, value),
            _ => req.set_header(projected.name, value),
        }
    }

    async fn refresh_token(&self, _ctx: &TenantContext, token: &TokenInfo, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Ok(token.clone())
    }

    fn auth_type(&self) -> AuthType {
        AuthType::ApiKey
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
    async fn applies_header_by_default() {
        let cfg = AuthConfig {
            auth_type: AuthType::ApiKey,
            config: json!({"key": "abc", "name": "X-Api-Key"}),
            ..Default::default()
        };
        let token = ApiKeyStrategy.authenticate(&ctx(), &cfg).await.unwrap();
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        ApiKeyStrategy.apply_auth(&mut req, &token, &cfg);
        assert!(req.headers.contains(&("X-Api-Key".to_string(), "abc".to_string())));
    }

    #[tokio::test]
    async fn applies_query_param_when_configured() {
        let cfg = AuthConfig {
            auth_type: AuthType::ApiKey,
            config: json!({"key": "abc", "in": "query", "name": "api_key"}),
            ..Default::default()
        };
        let token = ApiKeyStrategy.authenticate(&ctx(), &cfg).await.unwrap();
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        ApiKeyStrategy.apply_auth(&mut req, &token, &cfg);
        assert!(req.query.contains(&("api_key".to_string(), "abc".to_string())));
    }

    #[tokio::test]
    async fn applies_configured_prefix() {
        let cfg = AuthConfig {
            auth_type: AuthType::ApiKey,
            config: json!({"key": "abc", "prefix": "Token "}),
            ..Default::default()
        };
        let token = ApiKeyStrategy.authenticate(&ctx(), &cfg).await.unwrap();
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        ApiKeyStrategy.apply_auth(&mut req, &token, &cfg);
        assert!(req.headers.iter().any(|(_, v)| v == "Token abc"));
    }
}
