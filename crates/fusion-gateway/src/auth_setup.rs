//! `{service}_auth_setup` tool handler (spec §4.15): the out-of-band login
//! flow completed through the `fusion-auth <blob>` instruction rather than
//! through the gateway's own request path.

use std::sync::Arc;

use fusion_domain::auth_code::AuthCodeBlob;
use fusion_domain::config::config_str;
use fusion_domain::error::{Error, Result};
use fusion_domain::store::AuthCodeStore;
use fusion_domain::tenant::TenantContext;

const AUTH_CODE_TTL_MINUTES: i64 = 15;

fn random_code() -> String {
    let bytes: [u8; 16] = std::array::from_fn(|_| rand::random::<u8>());
    hex::encode(bytes)
}

/// Emits a 15-minute one-shot auth code bound to `(tenantHash, service)` and
/// formats the human-readable setup message. `external_url` is the
/// `MCP_FUSION_EXTERNAL_URL`-equivalent resolved once at bootstrap.
pub struct AuthSetupHandler {
    auth_code_store: Arc<dyn AuthCodeStore>,
    external_url: Option<String>,
}

impl AuthSetupHandler {
    pub fn new(auth_code_store: Arc<dyn AuthCodeStore>, external_url: Option<String>) -> Self {
        Self { auth_code_store, external_url }
    }

    pub async fn invoke(&self, ctx: &TenantContext, service: &str, instructions: Option<&str>) -> Result<String> {
        let external_url = self.external_url.clone().ok_or_else(|| {
            Error::config("MCP_FUSION_EXTERNAL_URL", "", "auth-setup requires an external URL to be configured at bootstrap")
        })?;

        let code = random_code();
        let expires_at = chrono::Utc::now() + chrono::Duration::minutes(AUTH_CODE_TTL_MINUTES);
        self.auth_code_store.create(&code, &ctx.tenant_hash, service, expires_at).await?;

        let blob = AuthCodeBlob { url: external_url, code, service: service.to_string() };
        let instruction = blob.to_instruction()?;

        let mut message = String::new();
        if let Some(instructions) = instructions {
            if !instructions.is_empty() {
                message.push_str(instructions);
                message.push_str("\n\n");
            }
        }
        message.push_str(&instruction);
        message.push_str(&format!("\n\nThis code expires in {AUTH_CODE_TTL_MINUTES} minutes."));
        Ok(message)
    }
}

/// Pulls the optional service-configured setup instructions out of the
/// opaque `AuthConfig.config` map (camelCase preferred, per §4.7/§9 convention).
pub fn configured_instructions(auth_config: &fusion_domain::config::AuthConfig) -> Option<String> {
    config_str(&auth_config.config, "setupInstructions", "setup_instructions").map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct FakeAuthCodeStore {
        created: Mutex<HashMap<String, (String, String, DateTime<Utc>)>>,
    }

    #[async_trait]
    impl AuthCodeStore for FakeAuthCodeStore {
        async fn create(&self, code: &str, tenant_hash: &str, service: &str, expires_at: DateTime<Utc>) -> Result<()> {
            self.created.lock().await.insert(code.to_string(), (tenant_hash.to_string(), service.to_string(), expires_at));
            Ok(())
        }
        async fn resolve(&self, code: &str) -> Result<Option<(String, String)>> {
            Ok(self.created.lock().await.get(code).map(|(t, s, _)| (t.clone(), s.clone())))
        }
    }

    #[tokio::test]
    async fn requires_external_url() {
        let store = Arc::new(FakeAuthCodeStore { created: Mutex::new(HashMap::new()) });
        let handler = AuthSetupHandler::new(store, None);
        let ctx = TenantContext::new_no_auth("graph", "req-1");
        let err = handler.invoke(&ctx, "graph", None).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn message_contains_instruction_and_expiry() {
        let store = Arc::new(FakeAuthCodeStore { created: Mutex::new(HashMap::new()) });
        let handler = AuthSetupHandler::new(store, Some("https://gateway.example.com".to_string()));
        let ctx = TenantContext::new_no_auth("graph", "req-1");
        let message = handler.invoke(&ctx, "graph", Some("Log in with your work account.")).await.unwrap();
        assert!(message.contains("Log in with your work account."));
        assert!(message.contains("fusion-auth "));
        assert!(message.contains("expires in 15 minutes"));
    }

    #[tokio::test]
    async fn blob_resolves_back_to_tenant_and_service() {
        let store = Arc::new(FakeAuthCodeStore { created: Mutex::new(HashMap::new()) });
        let handler = AuthSetupHandler::new(store.clone(), Some("https://gateway.example.com".to_string()));
        let mut ctx = TenantContext::new_no_auth("graph", "req-1");
        ctx.tenant_hash = "a".repeat(64);
        let message = handler.invoke(&ctx, "graph", None).await.unwrap();
        let instruction = message.lines().find(|l| l.starts_with("fusion-auth ")).unwrap();
        let encoded = instruction.trim_start_matches("fusion-auth ");
        let blob = AuthCodeBlob::decode(encoded).unwrap();
        let resolved = store.resolve(&blob.code).await.unwrap().unwrap();
        assert_eq!(resolved, (ctx.tenant_hash, "graph".to_string()));
    }
}
