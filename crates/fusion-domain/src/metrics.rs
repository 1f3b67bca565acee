use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Aggregated counters for a single request, recorded once the handler
/// pipeline finishes (spec §3, §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub service: String,
    pub endpoint: String,
    pub correlation_id: String,
    pub status: Option<u16>,
    pub duration_ms: u64,
    pub retries: u32,
    pub cache_hit: bool,
    pub error_category: Option<String>,
}

/// Running statistics for a single endpoint within a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub cache_hit_count: u64,
    pub retry_count: u64,
    pub sum_latency_ms: u64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub errors_by_category: HashMap<String, u64>,
}

impl EndpointStats {
    pub fn record(&mut self, m: &RequestMetrics) {
        self.request_count += 1;
        if m.status.map(|s| (200..300).contains(&s)).unwrap_or(false) {
            self.success_count += 1;
        } else {
            self.error_count += 1;
            if let Some(cat) = &m.error_category {
                *self.errors_by_category.entry(cat.clone()).or_insert(0) += 1;
            }
        }
        if m.cache_hit {
            self.cache_hit_count += 1;
        }
        self.retry_count += m.retries as u64;
        self.sum_latency_ms += m.duration_ms;
        if self.min_latency_ms == 0 || m.duration_ms < self.min_latency_ms {
            self.min_latency_ms = m.duration_ms;
        }
        if m.duration_ms > self.max_latency_ms {
            self.max_latency_ms = m.duration_ms;
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.sum_latency_ms as f64 / self.request_count as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64
        }
    }
}

/// Per-service aggregate: one `EndpointStats` per endpoint ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub endpoints: HashMap<String, EndpointStats>,
}

impl ServiceMetrics {
    pub fn record(&mut self, m: &RequestMetrics) {
        self.endpoints.entry(m.endpoint.clone()).or_default().record(m);
    }

    pub fn totals(&self) -> EndpointStats {
        let mut total = EndpointStats::default();
        for stats in self.endpoints.values() {
            total.request_count += stats.request_count;
            total.success_count += stats.success_count;
            total.error_count += stats.error_count;
            total.cache_hit_count += stats.cache_hit_count;
            total.retry_count += stats.retry_count;
            total.sum_latency_ms += stats.sum_latency_ms;
            total.max_latency_ms = total.max_latency_ms.max(stats.max_latency_ms);
            if total.min_latency_ms == 0 || (stats.min_latency_ms != 0 && stats.min_latency_ms < total.min_latency_ms) {
                total.min_latency_ms = stats.min_latency_ms;
            }
            for (cat, count) in &stats.errors_by_category {
                *total.errors_by_category.entry(cat.clone()).or_insert(0) += count;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(status: u16, cache_hit: bool, duration_ms: u64) -> RequestMetrics {
        RequestMetrics {
            service: "x".into(),
            endpoint: "get".into(),
            correlation_id: "c1".into(),
            status: Some(status),
            duration_ms,
            retries: 0,
            cache_hit,
            error_category: if status >= 400 { Some("api_error".into()) } else { None },
        }
    }

    #[test]
    fn records_success_and_error_counts() {
        let mut stats = EndpointStats::default();
        stats.record(&metric(200, false, 10));
        stats.record(&metric(500, false, 20));
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.errors_by_category["api_error"], 1);
    }

    #[test]
    fn tracks_min_max_avg_latency() {
        let mut stats = EndpointStats::default();
        stats.record(&metric(200, false, 10));
        stats.record(&metric(200, false, 30));
        assert_eq!(stats.min_latency_ms, 10);
        assert_eq!(stats.max_latency_ms, 30);
        assert_eq!(stats.avg_latency_ms(), 20.0);
    }

    #[test]
    fn service_metrics_totals_sum_across_endpoints() {
        let mut svc = ServiceMetrics::default();
        let mut m1 = metric(200, false, 10);
        m1.endpoint = "get".into();
        let mut m2 = metric(200, false, 10);
        m2.endpoint = "list".into();
        svc.record(&m1);
        svc.record(&m2);
        assert_eq!(svc.totals().request_count, 2);
    }
}
