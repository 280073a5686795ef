//! Pipeline configuration (SPEC_FULL.md §10.3). A plain struct with
//! per-field defaults, mirroring the teacher's `RateLimitConfig::default()`
//! (`middleware/rate_limit.rs`) and `SessionConfig::default()`
//! (`scrapers/binance_session.rs`) — no file or CLI loading, callers
//! override fields directly.

use std::time::Duration;

/// Rate limit + backoff controls for one upstream (§6 E4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpstreamLimits {
    /// Token-bucket refill rate, in tokens/second.
    pub rate_per_sec: f64,
    pub burst: u32,
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl UpstreamLimits {
    pub const MARKETS: Self = Self {
        rate_per_sec: 0.1,
        burst: 1,
        base_delay: Duration::from_secs(1),
        max_attempts: 3,
    };

    pub const GAME_LOG: Self = Self {
        rate_per_sec: 1.0 / 3.0,
        burst: 2,
        base_delay: Duration::from_secs(1),
        max_attempts: 5,
    };

    /// Team form is cache-only with a 24h TTL and no live rate limit per
    /// upstream (§6 E4); `rate_per_sec` is generous so the token bucket
    /// never becomes the bottleneck for a cache-backed source.
    pub const TEAM_FORM: Self = Self {
        rate_per_sec: 1000.0,
        burst: 1000,
        base_delay: Duration::from_secs(1),
        max_attempts: 1,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// Top-level knobs for the orchestrator (§4.4, §5) and the rest of the
/// pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Bounded worker count (default W=3).
    pub max_concurrent_units: usize,
    /// Inter-unit delay range, sampled uniformly (§4.4).
    pub inter_unit_delay_min: Duration,
    pub inter_unit_delay_max: Duration,
    /// Minimum sample size for a non-model-only projection (§3 I4).
    pub min_sample_size: usize,
    /// Horizon applied to game logs (§6 E3): default 60 games or 120 days.
    pub game_log_horizon_games: usize,
    pub game_log_horizon_days: i64,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Per-upstream request timeout (§5): 60s first load, 5s probes.
    pub upstream_timeout: Duration,
    /// Whether an empty game list is an error (§7) or simply yields an
    /// empty `RunOutput`.
    pub strict_mode: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_units: 3,
            inter_unit_delay_min: Duration::from_millis(50),
            inter_unit_delay_max: Duration::from_millis(250),
            min_sample_size: 5,
            game_log_horizon_games: 60,
            game_log_horizon_days: 120,
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            upstream_timeout: Duration::from_secs(60),
            strict_mode: false,
        }
    }
}
