use chrono::{DateTime, Utc};

/// Shared error type used across every fusion crate.
///
/// `DeviceCode` is deliberately its own top-level variant rather than being
/// folded into `Authentication` — spec §4.8 step 5 requires it to propagate
/// verbatim to the caller so an interactive login can be completed, never
/// wrapped or logged as a failure.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("config error: field={field} value={value:?}: {message}")]
    Configuration {
        field: String,
        value: String,
        message: String,
    },

    #[error("validation error: parameter={parameter} rule={rule}: {message}")]
    Validation {
        parameter: String,
        value: String,
        rule: String,
        message: String,
    },

    #[error("authentication error: auth_type={auth_type} service={service}: {message}")]
    Authentication {
        auth_type: String,
        service: String,
        message: String,
        cause: Option<String>,
    },

    /// Not a failure: the caller must display these instructions to the
    /// human completing an interactive OAuth device-code login.
    #[error("device authentication required: visit {verification_uri} and enter code {user_code}")]
    DeviceCode {
        user_code: String,
        verification_uri: String,
        expires_at: DateTime<Utc>,
    },

    #[error("upstream API error: service={service} endpoint={endpoint} status={status} correlation_id={correlation_id}")]
    Api {
        service: String,
        endpoint: String,
        status: u16,
        body: String,
        retryable: bool,
        correlation_id: String,
    },

    #[error("network error: {method} {url}: {message}")]
    Network {
        url: String,
        method: String,
        message: String,
        cause: Option<String>,
        timeout: bool,
        retryable: bool,
    },

    #[error("circuit breaker open until {next_retry}: {message}")]
    CircuitBreaker {
        message: String,
        next_retry: DateTime<Utc>,
    },

    #[error("cache error: operation={operation} key={key}: {message}")]
    Cache {
        operation: String,
        key: String,
        message: String,
    },

    #[error("token error: {0}")]
    Token(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("json error: {0}")]
    Json(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

impl Error {
    pub fn config(field: impl Into<String>, value: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn validation(
        parameter: impl Into<String>,
        value: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Validation {
            parameter: parameter.into(),
            value: value.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// `true` for error kinds whose underlying cause is worth retrying at a
    /// higher level (network blips, 5xx/429/408). Terminal 4xx and all
    /// static/config-shaped errors return `false`.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { retryable, .. } => *retryable,
            Error::Api { retryable, .. } => *retryable,
            Error::CircuitBreaker { .. } => false,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
