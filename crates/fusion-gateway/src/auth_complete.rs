//! Completes an `oauth2_external`/`user_credentials` auth-setup round trip
//! from the `fusion-auth <blob>` instruction text (spec §4.15, §6) — the
//! consuming side of `auth_setup.rs`'s emit side. Driven by the
//! `fusion-gateway auth complete` CLI subcommand.

use fusion_domain::auth_code::AuthCodeBlob;
use fusion_domain::config::AuthType;
use fusion_domain::error::{Error, Result};

use crate::bootstrap::Gateway;

const COMPLETE_REQUEST_ID: &str = "cli-auth-complete";

/// Decodes `instruction` (a `fusion-auth <blob>` line or a bare blob),
/// resolves it against `gateway`'s configured services, and exchanges the
/// authorization code or stores the submitted credential fields.
pub async fn complete(
    gateway: &Gateway,
    instruction: &str,
    exchange_code: Option<&str>,
    redirect_uri: Option<&str>,
    fields: &[(String, String)],
) -> Result<String> {
    let encoded = instruction.trim().strip_prefix("fusion-auth ").unwrap_or_else(|| instruction.trim());
    let blob = AuthCodeBlob::decode(encoded)?;

    let service = gateway.config.services.get(&blob.service).ok_or_else(|| {
        Error::config("service", &blob.service, "service named in the auth-code blob is no longer present in config")
    })?;

    if !service.auth.auth_type.needs_auth_setup_tool() {
        return Err(Error::config(
            "auth.type",
            service.auth.auth_type.as_str(),
            "this service's auth type has no setup-completion flow",
        ));
    }

    let ctx = gateway
        .auth_manager
        .complete_auth_setup(&blob.code, COMPLETE_REQUEST_ID, &service.auth, redirect_uri.unwrap_or_default(), exchange_code, fields)
        .await?;

    match service.auth.auth_type {
        AuthType::Oauth2External => Ok(format!("{} authentication completed for tenant {}", blob.service, ctx.tenant_hash)),
        _ => Ok(format!("{} credentials stored for tenant {}", blob.service, ctx.tenant_hash)),
    }
}

/// Parses `name=value` CLI arguments into the pairs `complete` stores as
/// `user_credentials` fields.
pub fn parse_fields(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|entry| {
            entry.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())).ok_or_else(|| {
                Error::config("field", entry.as_str(), "expected \"name=value\"")
            })
        })
        .collect()
}
