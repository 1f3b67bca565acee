use std::collections::HashMap;
use std::sync::Arc;

use fusion_domain::config::AuthType;
use fusion_domain::error::{Error, Result};
use fusion_domain::store::TokenStore;

use crate::strategies::{
    ApiKeyStrategy, BasicStrategy, BearerStrategy, NoneStrategy, OAuth2DeviceStrategy, OAuth2ExternalStrategy,
    SessionJwtStrategy, UserCredentialsStrategy,
};
use crate::traits::AuthStrategy;

/// Total map from `AuthType` to its strategy implementation (spec §4.7, §9
/// redesign flag: a closed, statically-typed registry rather than dynamic
/// dispatch on a loosely-typed descriptor).
pub struct AuthStrategyRegistry {
    strategies: HashMap<AuthType, Arc<dyn AuthStrategy>>,
    /// Kept as a concrete type alongside the type-erased map so the
    /// auth-setup tool can call `exchange_code`, which is not part of the
    /// generic `AuthStrategy` surface (spec §4.14).
    oauth2_external: Arc<OAuth2ExternalStrategy>,
}

impl AuthStrategyRegistry {
    /// Builds the registry with every strategy wired to share one `reqwest::Client`
    /// and (for `oauth2_device`, which self-persists from a background poll)
    /// the gateway's `TokenStore`.
    pub fn new(client: reqwest::Client, token_store: Arc<dyn TokenStore>) -> Self {
        let oauth2_external = Arc::new(OAuth2ExternalStrategy::new(client.clone()));
        let mut strategies: HashMap<AuthType, Arc<dyn AuthStrategy>> = HashMap::new();
        strategies.insert(AuthType::None, Arc::new(NoneStrategy));
        strategies.insert(AuthType::Bearer, Arc::new(BearerStrategy));
        strategies.insert(AuthType::ApiKey, Arc::new(ApiKeyStrategy));
        strategies.insert(AuthType::Basic, Arc::new(BasicStrategy));
        strategies.insert(AuthType::Oauth2Device, Arc::new(OAuth2DeviceStrategy::new(client.clone(), token_store)));
        strategies.insert(AuthType::Oauth2External, oauth2_external.clone());
        strategies.insert(AuthType::SessionJwt, Arc::new(SessionJwtStrategy::new(client)));
        strategies.insert(AuthType::UserCredentials, Arc::new(UserCredentialsStrategy));
        Self { strategies, oauth2_external }
    }

    pub fn get(&self, auth_type: AuthType) -> Result<Arc<dyn AuthStrategy>> {
        self.strategies.get(&auth_type).cloned().ok_or_else(|| Error::Configuration {
            field: "auth.type".into(),
            value: auth_type.as_str().into(),
            message: "no strategy registered for this auth type".into(),
        })
    }

    pub fn oauth2_external(&self) -> Arc<OAuth2ExternalStrategy> {
        self.oauth2_external.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<dyn TokenStore> {
        struct Noop;
        #[async_trait::async_trait]
        impl TokenStore for Noop {
            async fn get(&self, _tenant_hash: &str, _service: &str) -> Result<Option<fusion_domain::token::TokenInfo>> {
                Ok(None)
            }
            async fn set(&self, _tenant_hash: &str, _service: &str, _token: &fusion_domain::token::TokenInfo) -> Result<()> {
                Ok(())
            }
            async fn delete(&self, _tenant_hash: &str, _service: &str) -> Result<()> {
                Ok(())
            }
        }
        Arc::new(Noop)
    }

    #[test]
    fn every_auth_type_has_a_registered_strategy() {
        let registry = AuthStrategyRegistry::new(reqwest::Client::new(), store());
        for auth_type in [
            AuthType::None,
            AuthType::Bearer,
            AuthType::ApiKey,
            AuthType::Basic,
            AuthType::Oauth2Device,
            AuthType::Oauth2External,
            AuthType::SessionJwt,
            AuthType::UserCredentials,
        ] {
            assert!(registry.get(auth_type).is_ok(), "missing strategy for {auth_type:?}");
        }
    }
}
