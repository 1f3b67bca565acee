//! Per-service circuit breaker (spec §4.10).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fusion_domain::config::CircuitBreakerConfig;
use fusion_domain::error::{Error, Result};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct ServiceState {
    state: State,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    opened_at: Option<Instant>,
}

impl ServiceState {
    fn new() -> Self {
        Self { state: State::Closed, failure_count: 0, success_count: 0, half_open_calls: 0, opened_at: None }
    }
}

/// Tracks CLOSED/OPEN/HALF_OPEN state per service name. `enabled: false`
/// in a service's config makes every check a no-op pass-through.
pub struct CircuitBreaker {
    services: Mutex<HashMap<String, ServiceState>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self { services: Mutex::new(HashMap::new()) }
    }

    /// Call before attempting a request. Returns `Err(Error::CircuitBreaker)`
    /// if the breaker is OPEN and the reset timeout hasn't elapsed yet, or
    /// if it's HALF_OPEN and the trial-call budget is exhausted.
    pub fn before_call(&self, service: &str, cfg: &CircuitBreakerConfig) -> Result<()> {
        if !cfg.enabled {
            return Ok(());
        }
        let mut services = self.services.lock();
        let entry = services.entry(service.to_string()).or_insert_with(ServiceState::new);

        match entry.state {
            State::Closed => Ok(()),
            State::Open => {
                let opened_at = entry.opened_at.unwrap_or_else(Instant::now);
                let reset_after = Duration::from_secs(cfg.reset_timeout_secs);
                if opened_at.elapsed() >= reset_after {
                    entry.state = State::HalfOpen;
                    entry.half_open_calls = 1;
                    entry.success_count = 0;
                    Ok(())
                } else {
                    let next_retry = opened_at + reset_after;
                    let wait = next_retry.saturating_duration_since(Instant::now());
                    Err(Error::CircuitBreaker {
                        message: format!("circuit open for service '{service}'"),
                        next_retry: chrono::Utc::now() + chrono::Duration::from_std(wait).unwrap_or_default(),
                    })
                }
            }
            State::HalfOpen => {
                if entry.half_open_calls >= cfg.half_open_max_calls {
                    Err(Error::CircuitBreaker {
                        message: format!("circuit half-open trial budget exhausted for service '{service}'"),
                        next_retry: chrono::Utc::now(),
                    })
                } else {
                    entry.half_open_calls += 1;
                    Ok(())
                }
            }
        }
    }

    /// Records a successful attempt; in HALF_OPEN, closes the breaker once
    /// `successThreshold` consecutive successes are observed.
    pub fn record_success(&self, service: &str, cfg: &CircuitBreakerConfig) {
        if !cfg.enabled {
            return;
        }
        let mut services = self.services.lock();
        let entry = services.entry(service.to_string()).or_insert_with(ServiceState::new);
        match entry.state {
            State::Closed => {
                entry.failure_count = 0;
            }
            State::HalfOpen => {
                entry.success_count += 1;
                if entry.success_count >= cfg.success_threshold {
                    entry.state = State::Closed;
                    entry.failure_count = 0;
                    entry.success_count = 0;
                    entry.half_open_calls = 0;
                    entry.opened_at = None;
                }
            }
            State::Open => {}
        }
    }

    /// Records a failed attempt; trips the breaker to OPEN once
    /// `failureThreshold` is reached, or immediately on a HALF_OPEN failure.
    pub fn record_failure(&self, service: &str, cfg: &CircuitBreakerConfig) {
        if !cfg.enabled {
            return;
        }
        let mut services = self.services.lock();
        let entry = services.entry(service.to_string()).or_insert_with(ServiceState::new);
        match entry.state {
            State::Closed => {
                entry.failure_count += 1;
                if entry.failure_count >= cfg.failure_threshold {
                    entry.state = State::Open;
                    entry.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                entry.state = State::Open;
                entry.opened_at = Some(Instant::now());
                entry.half_open_calls = 0;
                entry.success_count = 0;
            }
            State::Open => {}
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(failure_threshold: u32, reset_timeout_secs: u64, success_threshold: u32, half_open_max_calls: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig { enabled: true, failure_threshold, reset_timeout_secs, half_open_max_calls, success_threshold }
    }

    #[test]
    fn disabled_breaker_never_blocks() {
        let breaker = CircuitBreaker::new();
        let cfg = CircuitBreakerConfig { enabled: false, ..cfg(1, 30, 1, 1) };
        for _ in 0..10 {
            breaker.record_failure("svc", &cfg);
        }
        assert!(breaker.before_call("svc", &cfg).is_ok());
    }

    #[test]
    fn trips_open_after_failure_threshold() {
        let breaker = CircuitBreaker::new();
        let cfg = cfg(3, 30, 1, 1);
        assert!(breaker.before_call("svc", &cfg).is_ok());
        breaker.record_failure("svc", &cfg);
        breaker.record_failure("svc", &cfg);
        assert!(breaker.before_call("svc", &cfg).is_ok());
        breaker.record_failure("svc", &cfg);
        assert!(breaker.before_call("svc", &cfg).is_err());
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let breaker = CircuitBreaker::new();
        let cfg = cfg(1, 0, 1, 1);
        breaker.record_failure("svc", &cfg);
        assert!(breaker.before_call("svc", &cfg).is_ok());
        breaker.record_success("svc", &cfg);
        breaker.record_failure("svc", &cfg);
        assert!(breaker.before_call("svc", &cfg).is_ok());
    }

    #[test]
    fn half_open_failure_reopens_breaker() {
        let breaker = CircuitBreaker::new();
        let cfg = cfg(1, 0, 2, 5);
        breaker.record_failure("svc", &cfg);
        assert!(breaker.before_call("svc", &cfg).is_ok());
        breaker.record_failure("svc", &cfg);
        let err = breaker.before_call("svc", &cfg);
        assert!(err.is_err());
    }

    #[test]
    fn half_open_trial_budget_limits_concurrent_calls() {
        let breaker = CircuitBreaker::new();
        let cfg = cfg(1, 0, 5, 1);
        breaker.record_failure("svc", &cfg);
        assert!(breaker.before_call("svc", &cfg).is_ok());
        assert!(breaker.before_call("svc", &cfg).is_err());
    }
}
