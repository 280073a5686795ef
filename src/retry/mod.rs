//! Retry Executor — C3 (§4.3). Wraps an async operation with bounded
//! retries, exponential backoff with jitter, and circuit-breaker
//! awareness. Grounded on `scrapers/polymarket_api.rs::execute_with_retry`
//! (`backoff = (backoff * 2).min(30000)`) and
//! `scrapers/binance_session.rs::BackoffCalculator` (jitter source,
//! attempt bookkeeping).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::cache::CircuitBreaker;
use crate::config::RetryPolicy;
use crate::error::{OperationError, UpstreamError};

/// Computes the backoff delay for attempt `k` (1-indexed): base delay
/// scaled by `factor^(k-1)`, plus jitter uniformly sampled from
/// `[0, base * factor^(k-1))` (§4.3).
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, rng: &mut impl Rng) -> Duration {
    let scale = policy.backoff_factor.powi(attempt.saturating_sub(1) as i32);
    let base = policy.base_delay.as_secs_f64() * scale;
    let jitter = rng.gen_range(0.0..base.max(f64::EPSILON));
    Duration::from_secs_f64(base + jitter)
}

/// Runs `op` up to `policy.max_attempts` times, retrying only on the
/// declared transient set (§4.3). Non-transient failures and an open
/// circuit both surface immediately without consuming a retry attempt.
pub async fn execute_with_retry<T, F, Fut>(
    circuit: &CircuitBreaker,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OperationError>>,
{
    if !circuit.allow() {
        return Err(UpstreamError::CircuitOpen);
    }

    let mut rng = rand::thread_rng();
    let mut last_reason = String::new();

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => {
                circuit.record_success();
                return Ok(value);
            }
            Err(OperationError::NonTransient(reason)) => {
                // Non-retryable: surfaced immediately, does not trip the
                // circuit (it isn't an upstream health signal).
                warn!(reason = %reason, "non-transient failure, not retrying");
                return Err(UpstreamError::TransientExhausted { attempts: attempt, last_reason: reason });
            }
            Err(OperationError::Transient(cause)) => {
                circuit.record_failure();
                last_reason = cause.to_string();
                if attempt == policy.max_attempts {
                    break;
                }
                if !circuit.allow() {
                    return Err(UpstreamError::CircuitOpen);
                }
                let delay = backoff_delay(policy, attempt, &mut rng);
                debug!(attempt, delay_ms = delay.as_millis() as u64, reason = %last_reason, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(UpstreamError::TransientExhausted { attempts: policy.max_attempts, last_reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientCause;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let circuit = CircuitBreaker::new(10, Duration::from_secs(30));
        let policy = RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(1), backoff_factor: 2.0 };
        let calls = Arc::new(AtomicU32::new(0));

        let result = execute_with_retry(&circuit, &policy, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(OperationError::Transient(TransientCause::Timeout))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_surfaces_immediately() {
        let circuit = CircuitBreaker::new(10, Duration::from_secs(30));
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<i32, _> = execute_with_retry(&circuit, &policy, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OperationError::NonTransient("bad payload".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let circuit = CircuitBreaker::new(10, Duration::from_secs(30));
        let policy = RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(1), backoff_factor: 2.0 };

        let result: Result<i32, _> = execute_with_retry(&circuit, &policy, || async {
            Err(OperationError::Transient(TransientCause::Http(503)))
        })
        .await;

        assert_eq!(result, Err(UpstreamError::TransientExhausted { attempts: 3, last_reason: "http 503".to_string() }));
    }

    #[tokio::test]
    async fn does_not_retry_when_circuit_is_open() {
        let circuit = CircuitBreaker::new(1, Duration::from_secs(30));
        circuit.record_failure();
        let policy = RetryPolicy::default();

        let result: Result<i32, _> = execute_with_retry(&circuit, &policy, || async {
            Ok(1)
        })
        .await;

        assert_eq!(result, Err(UpstreamError::CircuitOpen));
    }
}
