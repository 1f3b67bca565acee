use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use fusion_domain::config::{config_str, AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::store::TokenStore;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

use crate::traits::AuthStrategy;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    expires_in: u64,
    #[serde(default)]
    interval: u64,
}

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
}

struct Projected {
    authorization_url: String,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    scope: Option<String>,
}

fn project(cfg: &AuthConfig) -> Result<Projected> {
    let authorization_url = config_str(&cfg.config, "authorizationURL", "authorization_url")
        .ok_or_else(|| missing("authorizationURL"))?
        .to_string();
    let token_url = config_str(&cfg.config, "tokenURL", "token_endpoint")
        .ok_or_else(|| missing("tokenURL"))?
        .to_string();
    let client_id = config_str(&cfg.config, "clientId", "client_id")
        .ok_or_else(|| missing("clientId"))?
        .to_string();
    let client_secret = config_str(&cfg.config, "clientSecret", "client_secret").map(str::to_string);
    let scope = config_str(&cfg.config, "scope", "scope").map(str::to_string);
    Ok(Projected { authorization_url, token_url, client_id, client_secret, scope })
}

fn missing(field: &str) -> Error {
    Error::Authentication {
        auth_type: "oauth2_device".into(),
        service: String::new(),
        message: format!("oauth2_device auth config must set \"{field}\""),
        cause: None,
    }
}

/// Device Authorization Grant (RFC 8628). `authenticate` requests a device
/// code, kicks off a background poll against `tokenURL`, and returns
/// `Error::DeviceCode` immediately so the caller can surface the user code
/// (spec §4.7). The background poll persists the resulting token directly
/// through `store` once the user completes the interactive login —
/// `authenticate` itself never blocks waiting for that to happen.
pub struct OAuth2DeviceStrategy {
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
}

impl OAuth2DeviceStrategy {
    pub fn new(client: reqwest::Client, store: Arc<dyn TokenStore>) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl AuthStrategy for OAuth2DeviceStrategy {
    async fn authenticate(&self, ctx: &TenantContext, cfg: &AuthConfig) -> Result<TokenInfo> {
        let projected = project(cfg)?;

        let mut form = vec![("client_id", projected.client_id.clone())];
        if let Some(scope) = &projected.scope {
            form.push(("scope", scope.clone()));
        }

        let resp = self
            .client
            .post(&projected.authorization_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| network_error(&projected.authorization_url, "POST", e))?;

        let device: DeviceCodeResponse = resp
            .json()
            .await
            .map_err(|e| Error::Authentication {
                auth_type: "oauth2_device".into(),
                service: ctx.service_name.clone(),
                message: format!("invalid device code response: {e}"),
                cause: None,
            })?;

        let verification_uri = device
            .verification_uri_complete
            .clone()
            .unwrap_or_else(|| device.verification_uri.clone());
        let user_code = device.user_code.clone();
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(device.expires_in as i64);

        spawn_poll(self.client.clone(), self.store.clone(), projected, ctx.clone(), device);

        Err(Error::DeviceCode {
            user_code,
            verification_uri,
            expires_at,
        })
    }

    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, _cfg: &AuthConfig) {
        req.set_header("Authorization", format!("{} {}", token.token_type, token.access_token));
    }

    async fn refresh_token(&self, ctx: &TenantContext, token: &TokenInfo, cfg: &AuthConfig) -> Result<TokenInfo> {
        let projected = project(cfg)?;
        let refresh_token = token.refresh_token.clone().ok_or_else(|| Error::Authentication {
            auth_type: "oauth2_device".into(),
            service: ctx.service_name.clone(),
            message: "no refresh token available".into(),
            cause: None,
        })?;
        exchange_refresh_token(&self.client, &projected, &refresh_token).await
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Oauth2Device
    }

    fn supports_refresh(&self) -> bool {
        true
    }
}

fn network_error(url: &str, method: &str, e: reqwest::Error) -> Error {
    Error::Network {
        url: url.to_string(),
        method: method.to_string(),
        message: e.to_string(),
        cause: None,
        timeout: e.is_timeout(),
        retryable: !e.is_builder(),
    }
}

async fn exchange_refresh_token(client: &reqwest::Client, projected: &Projected, refresh_token: &str) -> Result<TokenInfo> {
    let mut form = vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
        ("client_id", projected.client_id.clone()),
    ];
    if let Some(secret) = &projected.client_secret {
        form.push(("client_secret", secret.clone()));
    }
    let resp = client
        .post(&projected.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| network_error(&projected.token_url, "POST", e))?;
    let parsed: TokenResponse = resp.json().await.map_err(|e| Error::Authentication {
        auth_type: "oauth2_device".into(),
        service: String::new(),
        message: format!("invalid refresh response: {e}"),
        cause: None,
    })?;
    token_from_response(parsed, Some(refresh_token.to_string()))
}

fn token_from_response(resp: TokenResponse, fallback_refresh: Option<String>) -> Result<TokenInfo> {
    if let Some(err) = resp.error {
        return Err(Error::Authentication {
            auth_type: "oauth2_device".into(),
            service: String::new(),
            message: format!("token endpoint returned error: {err}"),
            cause: None,
        });
    }
    let access_token = resp.access_token.ok_or_else(|| Error::Authentication {
        auth_type: "oauth2_device".into(),
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

fn spawn_poll(
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    projected: Projected,
    ctx: TenantContext,
    device: DeviceCodeResponse,
) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(if device.interval == 0 { DEFAULT_POLL_INTERVAL_SECS } else { device.interval });
        let deadline = tokio::time::Instant::now() + Duration::from_secs(device.expires_in);

        loop {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(service = %ctx.service_name, "device code flow expired before completion");
                return;
            }
            tokio::time::sleep(interval).await;

            let form = vec![
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code".to_string()),
                ("device_code", device.device_code.clone()),
                ("client_id", projected.client_id.clone()),
            ];
            let resp = match client.post(&projected.token_url).form(&form).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "device code poll request failed");
                    continue;
                }
            };
            let parsed: TokenResponse = match resp.json().await {
                Ok(p) => p,
                Err(_) => continue,
            };
            match parsed.error.as_deref() {
                Some("authorization_pending") | Some("slow_down") => continue,
                Some(other) => {
                    tracing::warn!(error = other, "device code flow failed");
                    return;
                }
                None => {}
            }
            if let Ok(token) = token_from_response(parsed, None) {
                if let Err(e) = store.set(&ctx.tenant_hash, &ctx.service_name, &token).await {
                    tracing::warn!(error = %e, "failed to persist device-code token");
                }
                tracing::info!(service = %ctx.service_name, "device code flow completed");
                return;
            }
        }
    });
}
