//! Per-upstream token bucket (§4.2), generalized from the teacher's
//! per-IP sliding-window limiter in `middleware/rate_limit.rs` to a
//! continuously-refilling bucket with an async, bounded-wait acquire.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::UpstreamLimits;
use crate::error::UpstreamError;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket shared across however many callers need to throttle
/// against the same upstream. `acquire` blocks up to `max_wait`; on
/// timeout the caller gets `UpstreamError::Throttled` and is expected to
/// fail soft (§4.2).
pub struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(limits: UpstreamLimits) -> Self {
        let capacity = limits.burst.max(1) as f64;
        Self {
            rate_per_sec: limits.rate_per_sec.max(0.0001),
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    fn try_take(&self) -> Option<Duration> {
        let mut state = self.state.lock();
        self.refill_locked(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - state.tokens;
            Some(Duration::from_secs_f64(deficit / self.rate_per_sec))
        }
    }

    /// Blocks (via cooperative async sleeps, never a busy loop) until a
    /// token is available or `max_wait` elapses.
    pub async fn acquire(&self, max_wait: Duration) -> Result<(), UpstreamError> {
        let deadline = Instant::now() + max_wait;
        loop {
            match self.try_take() {
                None => return Ok(()),
                Some(wait) => {
                    if Instant::now() + wait > deadline {
                        debug!(wait_ms = wait.as_millis() as u64, "rate limiter timed out");
                        return Err(UpstreamError::Throttled);
                    }
                    tokio::time::sleep(wait.min(Duration::from_millis(50))).await;
                }
            }
        }
    }
}
