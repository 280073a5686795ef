use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The forecasting paths the projection engine can draw on (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    Deterministic,
    Empirical,
    Regression,
    MarketImplied,
    BayesianUpdate,
}

/// Evidentiary context carried alongside a projection, consumed by the
/// confidence engine's caps and penalties (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub sample_size: usize,
    pub recent_window_size: usize,
    pub bayes_effective_n: f64,
    pub volatility_cv: f64,
    pub methods_used: HashSet<ProjectionMethod>,
    /// Set when the projection had to run without a qualifying sample
    /// (§3 invariant I4) — e.g. a new call-up with no game log yet.
    pub model_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub market_key: String,
    pub projected_value: f64,
    pub projected_probability: f64,
    pub projection_margin: f64,
    pub evidence: Evidence,
    /// disagreement = stddev(per-path means) / mean(per-path means)
    pub disagreement: f64,
    /// |p_combined - p_market| > 0.15 (§4.6)
    pub fighting_the_market: bool,
}
