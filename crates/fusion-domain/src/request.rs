use serde_json::Value;

/// Canonical in-flight HTTP request representation threaded through the
/// Mapper → Auth → Retry/CircuitBreaker → HTTP-client pipeline.
///
/// A plain, cheaply-cloneable struct rather than a library-specific
/// request type so the retry executor can clone it per attempt (spec §4.9
/// step 1) without fighting `reqwest::Request`'s non-`Clone` body stream.
#[derive(Debug, Clone, Default)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    pub fn set_cookie(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.cookies.push((key.into(), value.into()));
    }

    /// Cookie header value combining every cookie pair, as the `cookie`
    /// auth-application location needs (spec §4.7 session_jwt).
    pub fn cookie_header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
