use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use fusion_domain::config::{config_str, AuthConfig, AuthType};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

use crate::traits::AuthStrategy;

/// One entry of the `fields[]` config: a named secret applied at its own
/// location, independent of the others (spec §4.7).
struct FieldConfig {
    name: String,
    location: String,
    param_name: String,
}

struct Projected {
    fields: Vec<FieldConfig>,
    auth_method: Option<String>,
}

fn field_from_value(v: &Value) -> Option<FieldConfig> {
    let name = v.get("name").and_then(Value::as_str)?.to_string();
    let location = v.get("location").or_else(|| v.get("in")).and_then(Value::as_str).unwrap_or("header").to_string();
    let param_name = v
        .get("paramName")
        .or_else(|| v.get("param_name"))
        .and_then(Value::as_str)
        .unwrap_or(&name)
        .to_string();
    Some(FieldConfig { name, location, param_name })
}

/// Reads `fields[]`, falling back to the single-value `headerName`/`in`
/// shape (an implicit field named `"value"`) for services that only ever
/// had one secret and never adopted the multi-field config.
fn project(cfg: &AuthConfig) -> Projected {
    let auth_method = config_str(&cfg.config, "authMethod", "auth_method").map(str::to_string);

    let fields = cfg
        .config
        .get("fields")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(field_from_value).collect::<Vec<_>>())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| {
            let header_name = config_str(&cfg.config, "headerName", "header_name").unwrap_or("Authorization").to_string();
            let location = config_str(&cfg.config, "in", "in").unwrap_or("header").to_string();
            vec![FieldConfig { name: "value".to_string(), location, param_name: header_name }]
        });

    Projected { fields, auth_method }
}

/// A field's stored value lives in `TokenInfo.metadata` keyed by field name;
/// the single-value fallback shape has no metadata and reads `access_token`
/// directly instead.
fn field_value(token: &TokenInfo, name: &str) -> String {
    token.metadata.get(name).and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| token.access_token.clone())
}

/// Credentials supplied per-tenant out-of-band through the `{service}_auth_setup`
/// tool rather than from static config — e.g. a customer's own API key for a
/// service the gateway proxies on their behalf (spec §4.7, §4.14). There is
/// no upstream login or refresh call: the stored `TokenInfo` the auth-setup
/// tool wrote IS the credential, verbatim.
#[derive(Debug, Default)]
pub struct UserCredentialsStrategy;

#[async_trait]
impl AuthStrategy for UserCredentialsStrategy {
    async fn authenticate(&self, ctx: &TenantContext, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Err(Error::Authentication {
            auth_type: "user_credentials".into(),
            service: ctx.service_name.clone(),
            message: "no stored credential; complete setup via the service's auth_setup tool".into(),
            cause: None,
        })
    }

    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, cfg: &AuthConfig) {
        let projected = project(cfg);

        if projected.auth_method.as_deref() == Some("basic_auth") && projected.fields.len() == 2 {
            let user = field_value(token, &projected.fields[0].name);
            let pass = field_value(token, &projected.fields[1].name);
            let encoded = STANDARD.encode(format!("{user}:{pass}"));
            req.set_header("Authorization", format!("Basic {encoded}"));
            return;
        }

        for field in &projected.fields {
            let value = field_value(token, &field.name);
            match field.location.as_str() {
                "query" => req.set_query(field.param_name.clone(), value),
                "cookie" => req.set_cookie(field.param_name.clone(), value),
                _ => req.set_header(field.param_name.clone(), value),
            }
        }
    }

    async fn refresh_token(&self, _ctx: &TenantContext, token: &TokenInfo, _cfg: &AuthConfig) -> Result<TokenInfo> {
        Ok(token.clone())
    }

    fn auth_type(&self) -> AuthType {
        AuthType::UserCredentials
    }

    fn supports_refresh(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn authenticate_without_a_stored_credential_errors() {
        let ctx = TenantContext::new_no_auth("svc", "req-1");
        let err = UserCredentialsStrategy.authenticate(&ctx, &AuthConfig::default()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn applies_as_header_by_default() {
        let cfg = AuthConfig {
            auth_type: AuthType::UserCredentials,
            config: json!({"headerName": "X-Customer-Key"}),
            ..Default::default()
        };
        let token = TokenInfo::new("cust-key");
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        UserCredentialsStrategy.apply_auth(&mut req, &token, &cfg);
        assert!(req.headers.contains(&("X-Customer-Key".to_string(), "cust-key".to_string())));
    }

    fn token_with_fields(fields: &[(&str, &str)]) -> TokenInfo {
        let mut token = TokenInfo::new("unused");
        for (k, v) in fields {
            token.metadata.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        token
    }

    #[tokio::test]
    async fn named_fields_apply_to_their_own_locations() {
        let cfg = AuthConfig {
            auth_type: AuthType::UserCredentials,
            config: json!({"fields": [
                {"name": "apiKey", "location": "header", "paramName": "X-Api-Key"},
                {"name": "accountId", "location": "query", "paramName": "account_id"},
                {"name": "sessionId", "location": "cookie", "paramName": "sid"}
            ]}),
            ..Default::default()
        };
        let token = token_with_fields(&[("apiKey", "key-1"), ("accountId", "acct-1"), ("sessionId", "sess-1")]);
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        UserCredentialsStrategy.apply_auth(&mut req, &token, &cfg);
        assert!(req.headers.contains(&("X-Api-Key".to_string(), "key-1".to_string())));
        assert!(req.query.contains(&("account_id".to_string(), "acct-1".to_string())));
        assert!(req.cookies.contains(&("sid".to_string(), "sess-1".to_string())));
    }

    #[tokio::test]
    async fn basic_auth_method_combines_exactly_two_fields() {
        let cfg = AuthConfig {
            auth_type: AuthType::UserCredentials,
            config: json!({
                "authMethod": "basic_auth",
                "fields": [{"name": "username", "location": "header"}, {"name": "password", "location": "header"}]
            }),
            ..Default::default()
        };
        let token = token_with_fields(&[("username", "alice"), ("password", "wonderland")]);
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        UserCredentialsStrategy.apply_auth(&mut req, &token, &cfg);
        let expected = format!("Basic {}", STANDARD.encode("alice:wonderland"));
        assert!(req.headers.contains(&("Authorization".to_string(), expected)));
    }
}
