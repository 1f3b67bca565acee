//! Backoff/jitter retry executor (spec §4.9).

use std::time::Duration;

use fusion_domain::config::{RetryConfig, RetryStrategy};
use fusion_domain::error::{Error, Result};

/// How the last attempt's outcome should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    Retryable,
    Terminal,
}

/// Classifies an HTTP status per spec §4.9 step 3: 5xx/429/408 retryable,
/// other 4xx terminal, 2xx/3xx success.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=399 => Classification::Success,
        429 | 408 => Classification::Retryable,
        500..=599 => Classification::Retryable,
        _ => Classification::Terminal,
    }
}

fn compute_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
    let base = cfg.base_delay_ms as f64;
    let raw_ms = match cfg.strategy {
        RetryStrategy::Fixed => base,
        RetryStrategy::Linear => base * (attempt as f64 + 1.0),
        RetryStrategy::Exponential => base * cfg.backoff_factor.powi(attempt as i32),
    };
    let clamped_ms = raw_ms.min(cfg.max_delay_ms as f64).max(0.0);

    let final_ms = if cfg.jitter {
        let half = clamped_ms / 2.0;
        half + rand::random::<f64>() * half
    } else {
        clamped_ms
    };
    Duration::from_millis(final_ms.round() as u64)
}

/// Runs `attempt_fn` up to `cfg.max_attempts` times, sleeping between
/// retryable failures per `cfg.strategy` with optional jitter (spec §4.9).
/// `attempt_fn` returns `Ok(T)` on success or `Err((Error, Classification))`
/// so the executor can tell terminal failures from ones worth retrying.
pub async fn execute<T, F, Fut>(cfg: &RetryConfig, mut attempt_fn: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, (Error, Classification)>>,
{
    if !cfg.enabled {
        return match attempt_fn(0).await {
            Ok(v) => Ok(v),
            Err((e, _)) => Err(e),
        };
    }

    let max_attempts = cfg.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        match attempt_fn(attempt).await {
            Ok(v) => return Ok(v),
            Err((e, classification)) => {
                let is_last = attempt + 1 >= max_attempts;
                if classification != Classification::Retryable || is_last {
                    return Err(e);
                }
                last_error = Some(e);
                let delay = compute_delay(cfg, attempt);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Network {
        url: String::new(),
        method: String::new(),
        message: "retry executor exhausted attempts without a recorded error".into(),
        cause: None,
        timeout: false,
        retryable: false,
    }))
}
