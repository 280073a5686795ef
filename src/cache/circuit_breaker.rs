//! Per-upstream circuit breaker (§4.2), modeled on the teacher's
//! connection-state machine in `scrapers/binance_session.rs`
//! (`SessionState`, `EndpointRotator::record_failure`/`record_success`) —
//! a hand-written enum with manual transitions rather than a derive-macro
//! state machine.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

struct State {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Opens after `failure_threshold` consecutive failures within the
/// tracking window; while open, calls are short-circuited for `cooldown`,
/// then a single half-open trial decides whether to close or reopen.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(State {
                status: CircuitStatus::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Whether a call should be allowed through right now. Transitions
    /// Open -> HalfOpen automatically once the cooldown has elapsed.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock();
        match state.status {
            CircuitStatus::Closed | CircuitStatus::HalfOpen => true,
            CircuitStatus::Open => {
                let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.cooldown {
                    state.status = CircuitStatus::HalfOpen;
                    info!("circuit half-open after cooldown, allowing a single trial");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        if state.status != CircuitStatus::Closed {
            info!("circuit closing after successful trial");
        }
        state.status = CircuitStatus::Closed;
        state.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match state.status {
            CircuitStatus::HalfOpen => {
                warn!("half-open trial failed, reopening circuit");
                state.status = CircuitStatus::Open;
                state.opened_at = Some(Instant::now());
                state.consecutive_failures = self.failure_threshold;
            }
            _ => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.failure_threshold {
                    warn!(failures = state.consecutive_failures, "circuit opening");
                    state.status = CircuitStatus::Open;
                    state.opened_at = Some(Instant::now());
                }
            }
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.state.lock().status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        assert!(cb.allow());
        cb.record_failure();
        cb.record_failure();
        assert!(cb.allow());
        cb.record_failure();
        assert_eq!(cb.status(), CircuitStatus::Open);
        assert!(!cb.allow());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status(), CircuitStatus::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(0));
        cb.record_failure();
        assert_eq!(cb.status(), CircuitStatus::Open);
        assert!(cb.allow()); // cooldown elapsed immediately -> half-open
        assert_eq!(cb.status(), CircuitStatus::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.status(), CircuitStatus::Open);
    }
}
