use async_trait::async_trait;

use fusion_domain::config::{AuthConfig, AuthType};
use fusion_domain::error::Result;
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_domain::token::TokenInfo;

/// One implementation per auth type (spec §4.7). Modeled as a closed set of
/// variants behind this stable capability trait rather than dynamic
/// dispatch on a loosely-typed strategy descriptor (spec §9).
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Perform the strategy's initial credential-acquisition flow.
    /// `oauth2_device` returns `Error::DeviceCode` the first time there is
    /// no cached token; `oauth2_external` always does (spec §4.7).
    async fn authenticate(&self, ctx: &TenantContext, cfg: &AuthConfig) -> Result<TokenInfo>;

    /// Mutate `req` in place to carry this strategy's credentials.
    fn apply_auth(&self, req: &mut OutboundRequest, token: &TokenInfo, cfg: &AuthConfig);

    /// Exchange a refresh token (or equivalent) for a new `TokenInfo`.
    /// Only called when `supports_refresh()` is `true`.
    async fn refresh_token(&self, ctx: &TenantContext, token: &TokenInfo, cfg: &AuthConfig) -> Result<TokenInfo>;

    fn auth_type(&self) -> AuthType;

    fn supports_refresh(&self) -> bool;
}
