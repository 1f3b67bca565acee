use async_trait::async_trait;
use serde::Deserialize;

use fusion_domain::config::{config_str, AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

use crate::traits::AuthStrategy;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct Projected {
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    scope: Option<String>,
}

fn project(cfg: &AuthConfig) -> Result<Projected> {
    let token_url = config_str(&cfg.config, "tokenURL", "token_endpoint")
        .ok_or_else(|| missing("tokenURL"))?
        .to_string();
    let client_id = config_str(&cfg.config, "clientId", "client_id")
        .ok_or_else(|| missing("clientId"))?
        .to_string();
    let client_secret = config_str(&cfg.config, "clientSecret", "client_secret").map(str::to_string);
    let scope = config_str(&cfg.config, "scope", "scope").map(str::to_string);
    Ok(Projected { token_url, client_id, client_secret, scope })
}

fn missing(field: &str) -> Error {
    Error::Authentication {
        auth_type: "oauth2_external".into(),
        service: String::new(),
        message: format!("oauth2_external auth config must set \"{field}\""),
        cause: None,
    }
}

fn network_error(url: &str, e: reqwest::Error) -> Error {
    Error::Network {
        url: url.to_string(),
        method: "POST".to_string(),
        message: e.to_string(),
        cause: None,
        timeout: e.is_timeout(),
        retryable: !e.is_builder(),
    }
}

fn token_from_response(resp: TokenResponse, fallback_refresh: Option<String>) -> Result<TokenInfo> {
    if let Some(err) = resp.error {
        let detail = resp.error_description.unwrap_or_default();
        return Err(Error::Authentication {
            auth_type: "oauth2_external".into(),
            service: String::new(),
            message: format!("token endpoint returned error: {err} {detail}"),
            cause: None,
        });
    }
    let access_token = resp.access_token.ok_or_else(|| Error::Authentication {
        auth_type: "oauth2_external".into(),
        service: String::new(),
        message: "token endpoint response missing access_token".into(),
        cause: None,
    })?;
    let mut token = TokenInfo::new(access_token);
    token.refresh_token = resp.refresh_token.or(fallback_refresh);
    if let Some(exp) = resp.expires_in {
        token.expires_at = Some(chrono::Utc::now() + chrono::Duration::seconds(exp));
    }
    if let Some(scope) = resp.scope {
        token.scope = scope.split_whitespace().map(str::to_string).collect();
    }
    Ok(token)
}

/// Authorization Code grant completed out-of-band by the `{service}_auth_setup`
/// tool (spec §4.14). `authenticate` itself never initiates a browser
/// redirect — it only exchanges the code delivered via the auth-code blob
/// for a token, and the manager is responsible for calling it with that code
/// already resolved into `TenantContext`. Refreshing uses the standard
/// `refresh_token` grant.
pub struct OAuth2ExternalStrategy {
    client: reqwest::Client,
}

impl OAuth2ExternalStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Exchanges an authorization code obtained by the auth-setup tool's
    /// redirect handler for a token. Called directly by the gateway's
    /// auth-setup callback, not through the generic `AuthStrategy::authenticate`
    /// path (which has no code to exchange without one).
    pub async fn exchange_code(&self, cfg: &AuthConfig, code: &str, redirect_uri: &str) -> Result<TokenInfo> {
        let projected = project(cfg)?;
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("client_id", projected.client_id.clone()),
        ];
        if let Some(secret) = &projected.client_secret {
            form.push(("client_secret", secret.clone()));
        }
        let resp = self
            .client
            .post(&projected.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| network_error(&projected.token_url, e))?;
        let parsed: TokenResponse = resp.json().await.map_err(|e| Error::Authentication {
            auth_type: "oauth2_external".into(),
            service: String::new(),
            message: format!("invalid token response: {e}"),
            cause: None,
        })?;
        token_from_response(parsed, None)
    }
}

#[async_trait]
impl AuthStrategy for OAuth2ExternalStrategy {
    async fn authenticate(&self, ctx: &TenantContext, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Err(Error::Authentication {
            auth_type: "oauth2_external".into(),
            service: ctx.service_name.clone(),
            message: "no cached token; complete setup via the service's auth_setup tool".into(),
            cause: None,
        })
    }

    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, _cfg: &AuthConfig) {
        req.set_header("Authorization", format!("{} {}", token.token_type, token.access_token));
    }

    async fn refresh_token(&self, ctx: &TenantContext, token: &TokenInfo, cfg: &AuthConfig) -> Result<TokenInfo> {
        let projected = project(cfg)?;
        let refresh_token = token.refresh_token.clone().ok_or_else(|| Error::Authentication {
            auth_type: "oauth2_external".into(),
            service: ctx.service_name.clone(),
            message: "no refresh token available".into(),
            cause: None,
        })?;
        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
            ("client_id", projected.client_id.clone()),
        ];
        if let Some(secret) = &projected.client_secret {
            form.push(("client_secret", secret.clone()));
        }
        if let Some(scope) = &projected.scope {
            form.push(("scope", scope.clone()));
        }
        let resp = self
            .client
            .post(&projected.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| network_error(&projected.token_url, e))?;
        let parsed: TokenResponse = resp.json().await.map_err(|e| Error::Authentication {
            auth_type: "oauth2_external".into(),
            service: ctx.service_name.clone(),
            message: format!("invalid refresh response: {e}"),
            cause: None,
        })?;
        token_from_response(parsed, Some(refresh_token))
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Oauth2External
    }

    fn supports_refresh(&self) -> bool {
        true
    }
}
