//! The HTTP handler orchestrator (spec §4.11): per tool invocation, drives
//! validation, caching, request mapping, authentication, retry/circuit
//! breaker execution, 401-triggered invalidate-and-retry, pagination, and
//! metrics recording.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

use fusion_auth::AuthManager;
use fusion_cache::{keys::response_cache_key, Cache};
use fusion_domain::config::{CircuitBreakerConfig, EndpointConfig, ResponseType, RetryConfig, ServiceConfig};
use fusion_domain::error::{Error, Result};
use fusion_domain::metrics::RequestMetrics;
use fusion_domain::request::OutboundRequest;
use fusion_domain::tenant::TenantContext;
use fusion_mapper::{apply_headers, apply_query_params, build_request_body, build_url, param_names, set_nested_value, transform_response, validate_parameters};

use crate::circuit_breaker::CircuitBreaker;
use crate::client;
use crate::metrics::MetricsCollector;
use crate::retry::{self, Classification};

const MAX_PAGES: u32 = 10;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpHandler {
    client: reqwest::Client,
    auth_manager: Arc<AuthManager>,
    cache: Arc<dyn Cache>,
    circuit_breaker: CircuitBreaker,
    metrics: Arc<MetricsCollector>,
    correlation_counter: AtomicU64,
    request_timeout: Duration,
}

impl HttpHandler {
    pub fn new(client: reqwest::Client, auth_manager: Arc<AuthManager>, cache: Arc<dyn Cache>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            client,
            auth_manager,
            cache,
            circuit_breaker: CircuitBreaker::new(),
            metrics,
            correlation_counter: AtomicU64::new(0),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `mcpfusion-<epoch>-<counter>` (spec GLOSSARY "Correlation ID").
    fn next_correlation_id(&self) -> String {
        let n = self.correlation_counter.fetch_add(1, Ordering::SeqCst);
        format!("mcpfusion-{}-{n}", chrono::Utc::now().timestamp())
    }

    /// Full pipeline for one tool invocation against `service_id`/`endpoint`
    /// (spec §4.11 steps 1-13). `args` are the caller-supplied, externally
    /// aliased parameter values.
    pub async fn call_endpoint(
        &self,
        service_id: &str,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        args: Map<String, Value>,
        ctx: &TenantContext,
    ) -> Result<String> {
        let correlation_id = self.next_correlation_id();
        let start = Instant::now();
        let retries = Arc::new(AtomicU32::new(0));

        let outcome = self.run(service_id, service, endpoint, args, ctx, &correlation_id, &retries).await;

        match &outcome {
            Err(Error::DeviceCode { .. }) => {
                // Not a failure; the caller will surface this to the human
                // completing login. No metrics recorded for an interactive pause.
            }
            Ok((result, cache_hit)) => {
                self.metrics.record(RequestMetrics {
                    service: service_id.to_string(),
                    endpoint: endpoint.id.clone(),
                    correlation_id: correlation_id.clone(),
                    status: Some(200),
                    duration_ms: start.elapsed().as_millis() as u64,
                    retries: retries.load(Ordering::SeqCst),
                    cache_hit: *cache_hit,
                    error_category: None,
                });
                let _ = result;
            }
            Err(e) => {
                self.metrics.record(RequestMetrics {
                    service: service_id.to_string(),
                    endpoint: endpoint.id.clone(),
                    correlation_id: correlation_id.clone(),
                    status: status_of(e),
                    duration_ms: start.elapsed().as_millis() as u64,
                    retries: retries.load(Ordering::SeqCst),
                    cache_hit: false,
                    error_category: Some(error_category(e).to_string()),
                });
            }
        }

        outcome.map(|(result, _)| result)
    }

    async fn run(
        &self,
        service_id: &str,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        args: Map<String, Value>,
        ctx: &TenantContext,
        correlation_id: &str,
        retries: &Arc<AtomicU32>,
    ) -> Result<(String, bool)> {
        let internal_args = param_names::unalias(&endpoint.parameters, &args)?;
        let filled = validate_parameters(&endpoint.parameters, &internal_args)?;

        let caching = service.default_caching.clone().unwrap_or_default();
        let cache_key = response_cache_key(service_id, &endpoint.id, &Value::Object(filled.clone()));
        if caching.enabled {
            if let Some(cached) = self.cache.get(&cache_key).await? {
                return Ok((cached, true));
            }
        }

        let base_url = service.effective_base_url(endpoint).to_string();
        let retry_cfg = service.retry_config.clone().unwrap_or_default();
        let cb_cfg = service.circuit_breaker_config.clone().unwrap_or_default();

        let mut req = build_request(&base_url, endpoint, &filled)?;
        self.auth_manager.apply_authentication(&mut req, ctx, &service.auth).await?;

        let mut response = self
            .execute_with_retry_cb(service_id, &retry_cfg, &cb_cfg, &req, correlation_id, service_id, &endpoint.id, retries)
            .await;

        if let Err(Error::Api { status, .. }) = &response {
            if service.auth.token_invalidation.status_codes.contains(status) {
                self.auth_manager.invalidate_token(ctx).await?;
                if service.auth.token_invalidation.retry_on_invalidation {
                    let mut retry_req = build_request(&base_url, endpoint, &filled)?;
                    self.auth_manager.apply_authentication(&mut retry_req, ctx, &service.auth).await?;
                    response = self
                        .execute_with_retry_cb(service_id, &retry_cfg, &cb_cfg, &retry_req, correlation_id, service_id, &endpoint.id, retries)
                        .await;
                }
            }
        }

        let (status, body) = response?;
        let _ = status;

        let result_value = if endpoint.response.paginated {
            self.paginate(service_id, &retry_cfg, &cb_cfg, &req, endpoint, correlation_id, body, retries).await?
        } else {
            let parsed = parse_body(endpoint.response.response_type, &body);
            match &endpoint.response.transform {
                Some(transform) => transform_response(&parsed, &transform.expression)?,
                None => parsed,
            }
        };

        let result_string = stringify_result(&result_value);

        if caching.enabled {
            self.cache.set(&cache_key, &result_string, Duration::from_secs(caching.ttl_secs)).await?;
        }

        Ok((result_string, false))
    }

    /// Pages through `nextPageTokenPath` up to [`MAX_PAGES`] (spec §9
    /// "Pagination loop cap of 10"), accumulating `dataPath` items, then
    /// rewraps them under the configured `dataPath` before applying the
    /// optional response transform (spec §9 "Response transform after
    /// pagination").
    #[allow(clippy::too_many_arguments)]
    async fn paginate(
        &self,
        service_id: &str,
        retry_cfg: &RetryConfig,
        cb_cfg: &CircuitBreakerConfig,
        first_req: &OutboundRequest,
        endpoint: &EndpointConfig,
        correlation_id: &str,
        first_page_body: Vec<u8>,
        retries: &Arc<AtomicU32>,
    ) -> Result<Value> {
        let pagination = endpoint
            .response
            .pagination
            .as_ref()
            .ok_or_else(|| Error::config("endpoint.response.pagination", &endpoint.id, "paginated endpoint missing pagination config"))?;

        let mut items: Vec<Value> = Vec::new();
        let mut page_data = parse_body(ResponseType::Json, &first_page_body);
        let mut pages_fetched = 0u32;

        loop {
            let (next_token, page_items) = fusion_mapper::extract_pagination_info(&page_data, pagination);
            items.extend(page_items);
            pages_fetched += 1;

            let Some(token) = next_token else { break };
            if pages_fetched >= MAX_PAGES {
                tracing::warn!(service = service_id, endpoint = %endpoint.id, pages_fetched, "pagination cap reached");
                break;
            }

            let mut next_req = first_req.clone();
            if token.starts_with("http://") || token.starts_with("https://") {
                next_req.url = token;
                next_req.query.clear();
            } else if let Some(param) = &pagination.next_page_token_param {
                next_req.query.retain(|(k, _)| k != param);
                next_req.set_query(param.clone(), token);
            } else {
                break;
            }

            let (_, body) = self
                .execute_with_retry_cb(service_id, retry_cfg, cb_cfg, &next_req, correlation_id, service_id, &endpoint.id, retries)
                .await?;
            page_data = parse_body(ResponseType::Json, &body);
        }

        match &endpoint.response.transform {
            Some(transform) => {
                let mut wrapped = Value::Object(Map::new());
                set_nested_value(&mut wrapped, &pagination.data_path, Value::Array(items));
                transform_response(&wrapped, &transform.expression)
            }
            None => Ok(Value::Array(items)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_with_retry_cb(
        &self,
        breaker_key: &str,
        retry_cfg: &RetryConfig,
        cb_cfg: &CircuitBreakerConfig,
        req: &OutboundRequest,
        correlation_id: &str,
        service_name: &str,
        endpoint_id: &str,
        retries: &Arc<AtomicU32>,
    ) -> Result<(u16, Vec<u8>)> {
        self.circuit_breaker.before_call(breaker_key, cb_cfg)?;

        let client = self.client.clone();
        let timeout = self.request_timeout;
        let result = retry::execute(retry_cfg, |attempt| {
            retries.store(attempt, Ordering::SeqCst);
            let req = req.clone();
            let client = client.clone();
            let correlation_id = correlation_id.to_string();
            let service_name = service_name.to_string();
            let endpoint_id = endpoint_id.to_string();
            async move {
                match client::send(&client, &req, timeout).await {
                    Ok(resp) => match retry::classify_status(resp.status) {
                        Classification::Success => Ok((resp.status, resp.body)),
                        classification => Err((
                            Error::Api {
                                service: service_name,
                                endpoint: endpoint_id,
                                status: resp.status,
                                body: String::from_utf8_lossy(&resp.body).into_owned(),
                                retryable: classification == Classification::Retryable,
                                correlation_id,
                            },
                            classification,
                        )),
                    },
                    Err(e) => {
                        let classification = if e.is_retryable() { Classification::Retryable } else { Classification::Terminal };
                        Err((e, classification))
                    }
                }
            }
        })
        .await;

        match &result {
            Ok(_) => self.circuit_breaker.record_success(breaker_key, cb_cfg),
            Err(_) => self.circuit_breaker.record_failure(breaker_key, cb_cfg),
        }
        result
    }
}

fn build_request(base_url: &str, endpoint: &EndpointConfig, filled: &Map<String, Value>) -> Result<OutboundRequest> {
    let url = build_url(base_url, &endpoint.path, &endpoint.parameters, filled)?;
    let mut req = OutboundRequest::new(endpoint.method.as_str(), url);
    apply_query_params(&mut req, &endpoint.path, &endpoint.parameters, filled)?;
    apply_headers(&mut req, &endpoint.parameters, filled)?;

    let has_body_params = endpoint.parameters.iter().any(|p| p.location == fusion_domain::config::ParamLocation::Body);
    if has_body_params {
        let body = build_request_body(&endpoint.parameters, filled)?;
        if body.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
            req.body = Some(body);
        }
    }
    Ok(req)
}

fn parse_body(response_type: ResponseType, bytes: &[u8]) -> Value {
    match response_type {
        ResponseType::Text => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ResponseType::Binary => Value::String(BASE64_STANDARD.encode(bytes)),
        ResponseType::Json => serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}

/// Bare strings are returned verbatim; everything else is pretty-printed
/// JSON (spec §6 "typically JSON indented with two spaces").
fn stringify_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

fn status_of(e: &Error) -> Option<u16> {
    match e {
        Error::Api { status, .. } => Some(*status),
        _ => None,
    }
}

fn error_category(e: &Error) -> &'static str {
    match e {
        Error::Configuration { .. } => "configuration",
        Error::Validation { .. } => "validation",
        Error::Authentication { .. } => "authentication",
        Error::DeviceCode { .. } => "device_code",
        Error::Api { .. } => "api_error",
        Error::Network { .. } => "network",
        Error::CircuitBreaker { .. } => "circuit_breaker",
        Error::Cache { .. } => "cache",
        Error::Token(_) => "token",
        Error::Io(_) => "io",
        Error::Json(_) => "json",
    }
}
