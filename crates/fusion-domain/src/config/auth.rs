use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    None,
    Bearer,
    ApiKey,
    Basic,
    Oauth2Device,
    Oauth2External,
    SessionJwt,
    UserCredentials,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::Bearer => "bearer",
            AuthType::ApiKey => "api_key",
            AuthType::Basic => "basic",
            AuthType::Oauth2Device => "oauth2_device",
            AuthType::Oauth2External => "oauth2_external",
            AuthType::SessionJwt => "session_jwt",
            AuthType::UserCredentials => "user_credentials",
        }
    }

    /// `true` for strategies with an interactive out-of-band setup flow,
    /// i.e. those that get a companion `{service}_auth_setup` tool (spec §4.15).
    pub fn needs_auth_setup_tool(&self) -> bool {
        matches!(self, AuthType::Oauth2External | AuthType::UserCredentials)
    }
}

fn default_invalidation_status_codes() -> Vec<u16> {
    vec![401]
}

fn default_retry_on_invalidation() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInvalidationConfig {
    #[serde(default = "default_invalidation_status_codes")]
    pub status_codes: Vec<u16>,
    #[serde(default = "default_retry_on_invalidation")]
    pub retry_on_invalidation: bool,
}

impl Default for TokenInvalidationConfig {
    fn default() -> Self {
        Self {
            status_codes: default_invalidation_status_codes(),
            retry_on_invalidation: default_retry_on_invalidation(),
        }
    }
}

/// Opaque-at-the-transport auth config. Each strategy projects `config`
/// into its own typed view the first time it runs (spec §3, §9 "opaque map
/// config per strategy").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub token_invalidation: TokenInvalidationConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_type: AuthType::None,
            config: Value::Null,
            token_invalidation: TokenInvalidationConfig::default(),
        }
    }
}

/// Looks up `camel` first, falling back to `snake` — several upstream
/// OAuth providers accept either key style (spec §4.7, §9).
pub fn config_str<'a>(config: &'a Value, camel: &str, snake: &str) -> Option<&'a str> {
    config
        .get(camel)
        .or_else(|| config.get(snake))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_key_preferred_over_snake() {
        let v = serde_json::json!({"clientId": "camel", "client_id": "snake"});
        assert_eq!(config_str(&v, "clientId", "client_id"), Some("camel"));
    }

    #[test]
    fn falls_back_to_snake_key() {
        let v = serde_json::json!({"client_id": "snake"});
        assert_eq!(config_str(&v, "clientId", "client_id"), Some("snake"));
    }

    #[test]
    fn default_invalidation_config() {
        let cfg = TokenInvalidationConfig::default();
        assert_eq!(cfg.status_codes, vec![401]);
        assert!(cfg.retry_on_invalidation);
    }

    #[test]
    fn auth_setup_tool_only_for_oauth2_external_and_user_credentials() {
        assert!(AuthType::Oauth2External.needs_auth_setup_tool());
        assert!(AuthType::UserCredentials.needs_auth_setup_tool());
        assert!(!AuthType::Bearer.needs_auth_setup_tool());
        assert!(!AuthType::Oauth2Device.needs_auth_setup_tool());
    }
}
