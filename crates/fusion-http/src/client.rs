//! Thin wrapper turning an [`OutboundRequest`] into a `reqwest` call
//! (spec §4.9 step 2 "Execute").

use std::time::Duration;

use reqwest::Method;

use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;

/// Raw transport-level response: status + body bytes. Parsing per
/// `response.type` happens one layer up in the handler.
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

fn network_error(req: &OutboundRequest, e: reqwest::Error) -> Error {
    Error::Network {
        url: req.url.clone(),
        method: req.method.clone(),
        message: e.to_string(),
        cause: None,
        timeout: e.is_timeout(),
        retryable: !e.is_builder(),
    }
}

/// Sends `req` over `client`, applying `timeout` per-attempt (spec §5: "HTTP
/// per-attempt timeouts are governed by the host HTTP client").
pub async fn send(client: &reqwest::Client, req: &OutboundRequest, timeout: Duration) -> Result<RawResponse> {
    let method = Method::from_bytes(req.method.as_bytes())
        .map_err(|_| Error::Network { url: req.url.clone(), method: req.method.clone(), message: "unsupported HTTP method".into(), cause: None, timeout: false, retryable: false })?;

    let mut builder = client.request(method, &req.url).timeout(timeout);
    for (key, value) in &req.headers {
        builder = builder.header(key, value);
    }
    if let Some(cookie) = req.cookie_header_value() {
        builder = builder.header("Cookie", cookie);
    }
    if !req.query.is_empty() {
        builder = builder.query(&req.query);
    }
    if let Some(body) = &req.body {
        builder = builder.json(body);
    }

    let response = builder.send().await.map_err(|e| network_error(req, e))?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| network_error(req, e))?.to_vec();
    Ok(RawResponse { status, body })
}
