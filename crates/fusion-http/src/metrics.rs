//! Per-service/per-endpoint metrics aggregation (spec §4.12).

use std::collections::HashMap;

use fusion_domain::metrics::{RequestMetrics, ServiceMetrics};
use parking_lot::RwLock;

/// Thread-safe collector the handler pipeline records every request into.
/// A disabled collector drops every `record` call, so callers never need
/// to branch on whether metrics are on.
pub struct MetricsCollector {
    enabled: bool,
    services: RwLock<HashMap<String, ServiceMetrics>>,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, services: RwLock::new(HashMap::new()) }
    }

    pub fn record(&self, metrics: RequestMetrics) {
        if !self.enabled {
            return;
        }
        self.services.write().entry(metrics.service.clone()).or_default().record(&metrics);
    }

    /// Returns a snapshot of every service's metrics (spec §4.12
    /// `GetGlobalMetrics`).
    pub fn global_metrics(&self) -> HashMap<String, ServiceMetrics> {
        self.services.read().clone()
    }

    pub fn service_metrics(&self, service: &str) -> Option<ServiceMetrics> {
        self.services.read().get(service).cloned()
    }

    /// A service is healthy if its observed error rate is at or below
    /// `threshold`, or if it has no recorded requests yet (spec §4.12
    /// `IsServiceHealthy`).
    pub fn is_service_healthy(&self, service: &str, threshold: f64) -> bool {
        match self.services.read().get(service) {
            None => true,
            Some(metrics) => metrics.totals().error_rate() <= threshold,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(service: &str, endpoint: &str, status: u16) -> RequestMetrics {
        RequestMetrics {
            service: service.into(),
            endpoint: endpoint.into(),
            correlation_id: "c".into(),
            status: Some(status),
            duration_ms: 5,
            retries: 0,
            cache_hit: false,
            error_category: if status >= 400 { Some("api_error".into()) } else { None },
        }
    }

    #[test]
    fn disabled_collector_records_nothing() {
        let collector = MetricsCollector::new(false);
        collector.record(metric("svc", "ep", 200));
        assert!(collector.service_metrics("svc").is_none());
    }

    #[test]
    fn aggregates_by_service_and_endpoint() {
        let collector = MetricsCollector::new(true);
        collector.record(metric("svc", "get", 200));
        collector.record(metric("svc", "get", 500));
        collector.record(metric("svc", "list", 200));
        let metrics = collector.service_metrics("svc").unwrap();
        assert_eq!(metrics.endpoints["get"].request_count, 2);
        assert_eq!(metrics.endpoints["list"].request_count, 1);
        assert_eq!(metrics.totals().request_count, 3);
    }

    #[test]
    fn unknown_service_is_reported_healthy() {
        let collector = MetricsCollector::new(true);
        assert!(collector.is_service_healthy("ghost", 0.1));
    }

    #[test]
    fn service_health_reflects_error_rate_threshold() {
        let collector = MetricsCollector::new(true);
        for _ in 0..9 {
            collector.record(metric("svc", "get", 200));
        }
        collector.record(metric("svc", "get", 500));
        assert!(collector.is_service_healthy("svc", 0.2));
        assert!(!collector.is_service_healthy("svc", 0.05));
    }

    #[test]
    fn global_metrics_snapshot_includes_all_services() {
        let collector = MetricsCollector::new(true);
        collector.record(metric("a", "x", 200));
        collector.record(metric("b", "y", 200));
        let global = collector.global_metrics();
        assert!(global.contains_key("a"));
        assert!(global.contains_key("b"));
    }
}
