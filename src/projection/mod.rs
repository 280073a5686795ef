//! Projection Engine — C6 (§4.6). Combines up to five forecasting paths
//! into one `ProjectionResult`. Grounded on `vault/updown15m.rs` and
//! `vault/rnjd.rs` for the z-score-then-CDF probability pattern, and
//! `signals/quality.rs::RollingStats` for the CV bookkeeping that feeds
//! both this engine's Normal approximation and the confidence engine's
//! volatility penalty.

pub mod paths;
pub mod stats;

use std::collections::HashSet;

use tracing::debug;

use crate::domain::{Evidence, GameLogEntry, MatchupFactors, Odds, ProjectionMethod, Side, Stat};

use paths::{
    bayesian_prior_weight, bayesian_update, coefficient_of_variation, deterministic, empirical, market_implied,
    normal_cover_probability, regression, PathEstimate, PathInputs,
};

/// Default path weights before renormalization over whichever paths
/// actually produced an estimate (§4.6).
const WEIGHT_DETERMINISTIC: f64 = 0.45;
const WEIGHT_EMPIRICAL: f64 = 0.25;
const WEIGHT_REGRESSION: f64 = 0.20;
const WEIGHT_MARKET_IMPLIED: f64 = 0.10;
const WEIGHT_BAYESIAN: f64 = 0.05;

fn default_weight(method: ProjectionMethod) -> f64 {
    match method {
        ProjectionMethod::Deterministic => WEIGHT_DETERMINISTIC,
        ProjectionMethod::Empirical => WEIGHT_EMPIRICAL,
        ProjectionMethod::Regression => WEIGHT_REGRESSION,
        ProjectionMethod::MarketImplied => WEIGHT_MARKET_IMPLIED,
        ProjectionMethod::BayesianUpdate => WEIGHT_BAYESIAN,
    }
}

pub struct ProjectionRequest<'a> {
    pub game_log: &'a [GameLogEntry],
    pub stat: Stat,
    pub side: Side,
    pub line: f64,
    pub odds: Odds,
    pub matchup: &'a MatchupFactors,
    pub expected_minutes: f64,
    pub days_rest: f64,
    pub is_home: bool,
    /// How many recent games the Bayesian path's likelihood term looks at.
    pub bayesian_recency_k: usize,
    /// I4: the sample floor below which `model_only` is set.
    pub min_sample_size: usize,
    pub market_key: String,
}

pub struct ProjectionOutput {
    pub result: crate::domain::ProjectionResult,
    pub notes: Vec<String>,
}

fn weighted_mean(estimates: &[(ProjectionMethod, f64)]) -> f64 {
    let total_weight: f64 = estimates.iter().map(|(m, _)| default_weight(*m)).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    estimates.iter().map(|(m, mean)| default_weight(*m) * mean).sum::<f64>() / total_weight
}

fn stddev_of(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Runs all five paths and combines them per §4.6. NaN or otherwise
/// non-finite path outputs are dropped with a note rather than propagated
/// (§4.6 "Numeric semantics").
pub fn project(request: &ProjectionRequest) -> ProjectionOutput {
    let mut notes = Vec::new();
    let path_inputs = PathInputs {
        game_log: request.game_log,
        stat: request.stat,
        side: request.side,
        line: request.line,
        odds: request.odds,
        matchup: request.matchup,
        expected_minutes: request.expected_minutes,
        days_rest: request.days_rest,
        is_home: request.is_home,
    };

    let mut candidates: Vec<PathEstimate> = Vec::new();
    for estimate in [
        deterministic(&path_inputs),
        empirical(&path_inputs),
        regression(&path_inputs),
        bayesian_update(&path_inputs, request.bayesian_recency_k),
    ]
    .into_iter()
    .flatten()
    {
        if estimate.mean.is_finite() {
            candidates.push(estimate);
        } else {
            notes.push(format!("{:?} path dropped: non-finite mean", estimate.method));
        }
    }

    let market_path = market_implied(&path_inputs);
    let p_market = market_path.probability.unwrap_or(0.5);

    let non_market_present = !candidates.is_empty();
    if !non_market_present {
        notes.push("no primary path available, falling back to market-implied".to_string());
        candidates.push(market_path);
    }

    let cv = coefficient_of_variation(request.game_log, request.stat);

    let means: Vec<(ProjectionMethod, f64)> = candidates.iter().map(|e| (e.method, e.mean)).collect();
    let combined_mean = weighted_mean(&means);

    let mean_of_means = means.iter().map(|(_, m)| *m).sum::<f64>() / means.len().max(1) as f64;
    let disagreement = if mean_of_means.abs() > 1e-9 {
        (stddev_of(&means.iter().map(|(_, m)| *m).collect::<Vec<_>>()) / mean_of_means).abs()
    } else {
        0.0
    };

    let probabilities: Vec<(ProjectionMethod, f64)> = candidates
        .iter()
        .map(|e| {
            let p = e
                .probability
                .or_else(|| normal_cover_probability(e.mean, cv, request.line, request.side))
                .unwrap_or(0.5);
            (e.method, p)
        })
        .collect();
    let combined_probability = weighted_mean(&probabilities).clamp(0.02, 0.98);

    let fighting_the_market = (combined_probability - p_market).abs() > 0.15;
    if fighting_the_market {
        notes.push("fighting the market: combined probability diverges from market-implied by > 0.15".to_string());
    }

    let sample_size = request.game_log.len();
    let model_only = sample_size < request.min_sample_size;
    if model_only {
        debug!(sample_size, min = request.min_sample_size, "projection running model-only (I4)");
    }

    let methods_used: HashSet<ProjectionMethod> = candidates.iter().map(|e| e.method).collect();
    let bayes_effective_n = if methods_used.contains(&ProjectionMethod::BayesianUpdate) {
        let k = request.bayesian_recency_k.min(sample_size);
        bayesian_prior_weight(k) + k as f64
    } else {
        0.0
    };

    let margin = match request.side {
        Side::Over => combined_mean - request.line,
        Side::Under | Side::Home | Side::Away => request.line - combined_mean,
    };

    let result = crate::domain::ProjectionResult {
        market_key: request.market_key.clone(),
        projected_value: combined_mean,
        projected_probability: combined_probability,
        projection_margin: margin,
        evidence: Evidence {
            sample_size,
            recent_window_size: request.bayesian_recency_k.min(sample_size),
            bayes_effective_n,
            volatility_cv: cv,
            methods_used,
            model_only,
        },
        disagreement,
        fighting_the_market,
    };

    ProjectionOutput { result, notes }
}
