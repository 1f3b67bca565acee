//! HTTP-based tool invocation pipeline (spec §4.9–§4.12): request mapping,
//! authentication, retry/circuit-breaker execution, pagination, caching,
//! and metrics, composed by [`HttpHandler`].

pub mod circuit_breaker;
pub mod client;
pub mod handler;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::CircuitBreaker;
pub use handler::HttpHandler;
pub use metrics::MetricsCollector;
