//! Error kinds (§7). Each carries the data a caller needs to react, and
//! none of them are allowed to escape `analyze` itself — they manifest as
//! missing evidence, downgraded tiers, or entries in `RunOutput::errors`
//! instead (§7 propagation policy).

use std::fmt;

/// Raised by an evidence adapter (C1) when a payload violates one of its
/// stated invariants. Non-retryable.
#[derive(Debug, Clone, PartialEq)]
pub struct BadUpstream {
    pub reason: String,
    pub excerpt: String,
}

impl fmt::Display for BadUpstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad upstream payload: {} ({})", self.reason, self.excerpt)
    }
}
impl std::error::Error for BadUpstream {}

/// A prop referencing a player key the upstream doesn't recognize (§6 E3).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerNotFound {
    pub normalized_key: String,
}

impl fmt::Display for PlayerNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player not found: {}", self.normalized_key)
    }
}
impl std::error::Error for PlayerNotFound {}

/// Adapter-level failures (§4.1, §7).
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterError {
    BadUpstream(BadUpstream),
    PlayerNotFound(PlayerNotFound),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::BadUpstream(e) => write!(f, "{e}"),
            AdapterError::PlayerNotFound(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for AdapterError {}

/// Outcomes the cache/rate-limiter/retry layer (C2/C3) can hand back
/// instead of a value, all of which callers are expected to treat as
/// missing evidence rather than a hard failure (§4.2, §4.3, §7).
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamError {
    /// A transient condition (timeout, connection reset, HTTP 429/5xx, or
    /// an explicit `Retry` outcome) that exhausted the retry budget.
    TransientExhausted { attempts: u32, last_reason: String },
    /// The rate limiter couldn't grant a token within `max_wait`.
    Throttled,
    /// The circuit for this upstream is open; the call was short-circuited.
    CircuitOpen,
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::TransientExhausted { attempts, last_reason } => {
                write!(f, "transient error exhausted after {attempts} attempts: {last_reason}")
            }
            UpstreamError::Throttled => write!(f, "throttled: rate limiter timed out"),
            UpstreamError::CircuitOpen => write!(f, "circuit open"),
        }
    }
}
impl std::error::Error for UpstreamError {}

/// The declared transient set an operation passed to the retry executor
/// (C3) can fail with (§4.3): network errors, timeouts, HTTP 429/5xx, or an
/// explicit `Retry` outcome. Anything else is non-transient and surfaces on
/// the first attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TransientCause {
    Network(String),
    Timeout,
    Http(u16),
    Retry,
}

impl fmt::Display for TransientCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientCause::Network(msg) => write!(f, "network error: {msg}"),
            TransientCause::Timeout => write!(f, "timeout"),
            TransientCause::Http(code) => write!(f, "http {code}"),
            TransientCause::Retry => write!(f, "explicit retry outcome"),
        }
    }
}

/// What an operation wrapped by the retry executor can fail with: either a
/// member of the transient set (eligible for another attempt) or a
/// non-transient failure that surfaces immediately (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum OperationError {
    Transient(TransientCause),
    NonTransient(String),
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::Transient(c) => write!(f, "{c}"),
            OperationError::NonTransient(msg) => write!(f, "{msg}"),
        }
    }
}
impl std::error::Error for OperationError {}

/// Raised post-compute when an invariant the value/confidence layer
/// depends on doesn't hold (§7, I1-I3). The recommendation carrying this is
/// downgraded to tier D and never appears in S/A/B/C (§4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityError {
    pub invariant: &'static str,
    pub detail: String,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "integrity violation ({}): {}", self.invariant, self.detail)
    }
}
impl std::error::Error for IntegrityError {}

/// Any uncaught failure inside a single game unit (§5 failure isolation).
/// The unit's partial output is discarded; this is recorded instead.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitError {
    pub game_id: String,
    pub reason: String,
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {} failed: {}", self.game_id, self.reason)
    }
}
impl std::error::Error for UnitError {}

/// The only failure mode of `analyze` itself (§7): malformed `RunInput`.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    EmptyGameListStrictMode,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::EmptyGameListStrictMode => {
                write!(f, "run input has no games and strict mode is set")
            }
        }
    }
}
impl std::error::Error for PipelineError {}
