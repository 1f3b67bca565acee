use serde::{Deserialize, Serialize};

use super::auth::AuthConfig;
use super::parameter::{ParameterConfig, TransformConfig};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Json,
    Text,
    Binary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Dotted path to the array of items in each page's JSON body.
    pub data_path: String,
    /// Dotted path to the next-page token/URL in the response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token_path: Option<String>,
    /// When the token is opaque (not a full URL), the query parameter it
    /// gets re-dispatched under on the next request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token_param: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(rename = "type", default = "default_response_type")]
    pub response_type: ResponseType,
    #[serde(default)]
    pub paginated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformConfig>,
}

fn default_response_type() -> ResponseType {
    ResponseType::Json
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            response_type: ResponseType::Json,
            paginated: false,
            pagination: None,
            transform: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: HttpMethod,
    pub path: String,
    /// Overrides the owning service's `base_url` for this endpoint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub response: ResponseConfig,
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::config("endpoint.id", "", "endpoint id must not be empty"));
        }
        if self.path.is_empty() {
            return Err(Error::config("endpoint.path", &self.id, "endpoint path must not be empty"));
        }
        if self.response.paginated && self.response.pagination.is_none() {
            return Err(Error::config(
                "endpoint.response.pagination",
                &self.id,
                "paginated endpoints must set response.pagination",
            ));
        }
        for p in &self.parameters {
            p.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_strategy")]
    pub strategy: RetryStrategy,
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "d_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "d_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "d_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "d_true")]
    pub jitter: bool,
    #[serde(default)]
    pub retryable_errors: Vec<String>,
}

fn d_true() -> bool {
    true
}
fn d_strategy() -> RetryStrategy {
    RetryStrategy::Exponential
}
fn d_max_attempts() -> u32 {
    3
}
fn d_base_delay_ms() -> u64 {
    500
}
fn d_max_delay_ms() -> u64 {
    30_000
}
fn d_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: RetryStrategy::Exponential,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter: true,
            retryable_errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "d_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
    #[serde(default = "d_half_open_max_calls")]
    pub half_open_max_calls: u32,
    #[serde(default = "d_success_threshold")]
    pub success_threshold: u32,
}

fn d_failure_threshold() -> u32 {
    5
}
fn d_reset_timeout_secs() -> u64 {
    30
}
fn d_half_open_max_calls() -> u32 {
    1
}
fn d_success_threshold() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 5,
            reset_timeout_secs: 30,
            half_open_max_calls: 1,
            success_threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn d_cache_ttl_secs() -> u64 {
    300
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_config: Option<CircuitBreakerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_caching: Option<CachingConfig>,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl ServiceConfig {
    pub fn validate(&self, service_id: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("service.name", service_id, "service name must not be empty"));
        }
        if self.base_url.is_empty() {
            return Err(Error::config("service.base_url", service_id, "service base_url must not be empty"));
        }
        if self.endpoints.is_empty() {
            return Err(Error::config(
                "service.endpoints",
                service_id,
                "service must declare at least one endpoint",
            ));
        }
        for ep in &self.endpoints {
            ep.validate()?;
        }
        Ok(())
    }

    /// The base URL an endpoint resolves to: its own override if set,
    /// otherwise the service base URL (spec §4.11 step 5).
    pub fn effective_base_url<'a>(&'a self, endpoint: &'a EndpointConfig) -> &'a str {
        endpoint.base_url.as_deref().unwrap_or(&self.base_url)
    }
}
