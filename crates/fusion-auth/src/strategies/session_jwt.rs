use async_trait::async_trait;
use serde_json::Value;

use fusion_domain::config::{config_str, AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;
use fusion_mapper::dot_get;

use crate::traits::AuthStrategy;

struct Projected {
    login_url: String,
    username: String,
    password: String,
    token_path: String,
    expires_in_path: Option<String>,
    refresh_token_path: Option<String>,
    apply_in: String,
    header_name: String,
    header_format: String,
    cookie_name: String,
    query_param: String,
}

fn project(cfg: &AuthConfig) -> Result<Projected> {
    let login_url = config_str(&cfg.config, "loginURL", "login_url")
        .ok_or_else(|| missing("loginURL"))?
        .to_string();
    let username = config_str(&cfg.config, "username", "username")
        .ok_or_else(|| missing("username"))?
        .to_string();
    let password = config_str(&cfg.config, "password", "password")
        .ok_or_else(|| missing("password"))?
        .to_string();
    let token_path = config_str(&cfg.config, "tokenPath", "token_path").unwrap_or("token").to_string();
    let expires_in_path = config_str(&cfg.config, "expiresInPath", "expires_in_path").map(str::to_string);
    let refresh_token_path = config_str(&cfg.config, "refreshTokenPath", "refresh_token_path").map(str::to_string);
    let apply_in = config_str(&cfg.config, "in", "in").unwrap_or("cookie").to_string();
    let header_name = config_str(&cfg.config, "headerName", "header_name").unwrap_or("Authorization").to_string();
    let header_format = config_str(&cfg.config, "headerFormat", "header_format").unwrap_or("Bearer {token}").to_string();
    let cookie_name = config_str(&cfg.config, "cookieName", "cookie_name").unwrap_or("session").to_string();
    let query_param = config_str(&cfg.config, "queryParam", "query_param").unwrap_or("token").to_string();
    Ok(Projected {
        login_url,
        username,
        password,
        token_path,
        expires_in_path,
        refresh_token_path,
        apply_in,
        header_name,
        header_format,
        cookie_name,
        query_param,
    })
}

/// Fills `{token}`/`{tokenType}` placeholders in a configured `headerFormat`
/// (spec §4.7; default `"Bearer {token}"` matches standard bearer auth).
fn render_header_format(format: &str, token: &TokenInfo) -> String {
    format.replace("{token}", &token.access_token).replace("{tokenType}", &token.token_type)
}

fn missing(field: &str) -> Error {
    Error::Authentication {
        auth_type: "session_jwt".into(),
        service: String::new(),
        message: format!("session_jwt auth config must set \"{field}\""),
        cause: None,
    }
}

/// Logs in against a username/password endpoint that returns a session
/// token or JWT, then applies it as a cookie or header on every request
/// (spec §4.7). The login response itself has no refresh grant — a new
/// login is just another `authenticate` call, so `supports_refresh` is
/// `false` and the manager re-authenticates from scratch on expiry.
pub struct SessionJwtStrategy {
    client: reqwest::Client,
}

impl SessionJwtStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthStrategy for SessionJwtStrategy {
    async fn authenticate(&self, ctx: &TenantContext, cfg: &AuthConfig) -> Result<TokenInfo> {
        let projected = project(cfg)?;
        let resp = self
            .client
            .post(&projected.login_url)
            .json(&serde_json::json!({"username": projected.username, "password": projected.password}))
            .send()
            .await
            .map_err(|e| Error::Network {
                url: projected.login_url.clone(),
                method: "POST".into(),
                message: e.to_string(),
                cause: None,
                timeout: e.is_timeout(),
                retryable: !e.is_builder(),
            })?;

        if !resp.status().is_success() {
            return Err(Error::Authentication {
                auth_type: "session_jwt".into(),
                service: ctx.service_name.clone(),
                message: format!("login failed with status {}", resp.status()),
                cause: None,
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| Error::Authentication {
            auth_type: "session_jwt".into(),
            service: ctx.service_name.clone(),
            message: format!("invalid login response: {e}"),
            cause: None,
        })?;

        let token_value = dot_get(&body, &projected.token_path)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Authentication {
                auth_type: "session_jwt".into(),
                service: ctx.service_name.clone(),
                message: format!("login response missing field \"{}\"", projected.token_path),
                cause: None,
            })?;

        let mut token = TokenInfo::new(token_value.to_string());

        if let Some(path) = &projected.expires_in_path {
            if let Some(exp) = dot_get(&body, path).and_then(Value::as_i64) {
                token.expires_at = Some(chrono::Utc::now() + chrono::Duration::seconds(exp));
            }
        }
        if let Some(path) = &projected.refresh_token_path {
            token.refresh_token = dot_get(&body, path).and_then(|v| v.as_str()).map(str::to_string);
        }
        Ok(token)
    }

    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, cfg: &AuthConfig) {
        let Ok(projected) = project(cfg) else { return };
        match projected.apply_in.as_str() {
            "header" => req.set_header(projected.header_name, render_header_format(&projected.header_format, token)),
            "query" => req.set_query(projected.query_param, token.access_token.clone()),
            _ => req.set_cookie(projected.cookie_name, token.access_token.clone()),
        }
    }

    async fn refresh_token(&self, ctx: &TenantContext, _token: &TokenInfo, cfg: &AuthConfig) -> Result<TokenInfo> {
        self.authenticate(ctx, cfg).await
    }

    fn auth_type(&self) -> AuthType {
        AuthType::SessionJwt
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
    async fn applies_cookie_by_default() {
        let cfg = AuthConfig {
            auth_type: AuthType::SessionJwt,
            config: json!({"loginURL": "https://x/login", "username": "u", "password": "p"}),
            ..Default::default()
        };
        let token = TokenInfo::new("sess-id");
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        SessionJwtStrategy::new(reqwest::Client::new()).apply_auth(&mut req, &token, &cfg);
        assert!(req.cookies.contains(&("session".to_string(), "sess-id".to_string())));
    }

    #[tokio::test]
    async fn applies_header_when_configured() {
        let cfg = AuthConfig {
            auth_type: AuthType::SessionJwt,
            config: json!({
                "loginURL": "https://x/login", "username": "u", "password": "p",
                "in": "header", "headerName": "X-Session"
            }),
            ..Default::default()
        };
        let token = TokenInfo::new("sess-id");
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        SessionJwtStrategy::new(reqwest::Client::new()).apply_auth(&mut req, &token, &cfg);
        assert!(req.headers.contains(&("X-Session".to_string(), "Bearer sess-id".to_string())));
    }

    #[tokio::test]
    async fn applies_query_param_when_configured() {
        let cfg = AuthConfig {
            auth_type: AuthType::SessionJwt,
            config: json!({
                "loginURL": "https://x/login", "username": "u", "password": "p",
                "in": "query", "queryParam": "session_token"
            }),
            ..Default::default()
        };
        let token = TokenInfo::new("sess-id");
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        SessionJwtStrategy::new(reqwest::Client::new()).apply_auth(&mut req, &token, &cfg);
        assert!(req.query.contains(&("session_token".to_string(), "sess-id".to_string())));
    }

    #[tokio::test]
    async fn custom_header_format_is_rendered() {
        let cfg = AuthConfig {
            auth_type: AuthType::SessionJwt,
            config: json!({
                "loginURL": "https://x/login", "username": "u", "password": "p",
                "in": "header", "headerName": "X-Token", "headerFormat": "Token {token} ({tokenType})"
            }),
            ..Default::default()
        };
        let token = TokenInfo::new("sess-id");
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        SessionJwtStrategy::new(reqwest::Client::new()).apply_auth(&mut req, &token, &cfg);
        assert!(req.headers.contains(&("X-Token".to_string(), "Token sess-id (Bearer)".to_string())));
    }

    #[test]
    fn dotted_token_path_resolves_nested_field() {
        let body = json!({"datas": {"token": "nested-jwt", "refresh": "nested-refresh"}, "expiresIn": 3600});
        assert_eq!(dot_get(&body, "datas.token").and_then(|v| v.as_str()), Some("nested-jwt"));
        assert_eq!(dot_get(&body, "datas.refresh").and_then(|v| v.as_str()), Some("nested-refresh"));
        assert_eq!(dot_get(&body, "expiresIn").and_then(Value::as_i64), Some(3600));
    }

    #[tokio::test]
    async fn missing_credentials_is_an_error() {
        let cfg = AuthConfig {
            auth_type: AuthType::SessionJwt,
            config: json!({"loginURL": "https://x/login"}),
            ..Default::default()
        };
        let result = SessionJwtStrategy::new(reqwest::Client::new()).authenticate(&ctx(), &cfg).await;
        assert!(result.is_err());
    }
}
