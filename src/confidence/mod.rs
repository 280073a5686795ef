//! Confidence Engine — C7 (§4.7). A single ordered chain of caps, shrinkage,
//! and penalties over a `ProjectionResult`, each one logged by name.
//! Grounded on `risk.rs`'s named-constant guardrail chain
//! (`MAX_KELLY_CAP`, `DRAWDOWN_THROTTLE_TRIGGER`) and
//! `signals/detector.rs`'s base-score-plus-bonuses-then-cap composition —
//! collapsed here into one parameterized pipeline rather than "v1/v2"
//! engine variants (§9).

use std::collections::BTreeMap;

use crate::domain::{MatchupFactors, ProjectionResult, RiskClass, RoleTrend, Stat};

const SAMPLE_CAP_UNDER_15: f64 = 75.0;
const SAMPLE_CAP_UNDER_30: f64 = 85.0;
const SAMPLE_CAP_UNDER_60: f64 = 90.0;
const SAMPLE_CAP_AT_LEAST_60: f64 = 95.0;

fn sample_size_cap(n: usize) -> f64 {
    if n < 15 {
        SAMPLE_CAP_UNDER_15
    } else if n < 30 {
        SAMPLE_CAP_UNDER_30
    } else if n < 60 {
        SAMPLE_CAP_UNDER_60
    } else {
        SAMPLE_CAP_AT_LEAST_60
    }
}

fn bayesian_prior_weight(n: usize) -> f64 {
    crate::projection::paths::bayesian_prior_weight(n)
}

/// Shrinks `p_raw` toward the league mean of 0.50 using the fixed-bucket
/// prior weights (§4.7 step 2; §9 Open Questions chose this over the
/// continuous `log(n+1)/log(21)` curve).
fn shrink_toward_league_mean(p_raw: f64, n: usize) -> f64 {
    let prior_weight = bayesian_prior_weight(n);
    ((prior_weight * 0.5) + (n as f64 * p_raw)) / (prior_weight + n as f64)
}

fn volatility_penalty(cv: f64) -> f64 {
    if cv > 0.40 {
        -15.0
    } else if cv > 0.30 {
        -8.0
    } else if cv > 0.20 {
        -3.0
    } else {
        0.0
    }
}

/// Everything the confidence engine needs beyond the `ProjectionResult`.
pub struct ConfidenceInputs<'a> {
    pub projection: &'a ProjectionResult,
    pub matchup: &'a MatchupFactors,
    pub stat: Stat,
    pub line: f64,
    pub role_trend: RoleTrend,
    pub minutes_variance_fraction: f64,
    pub implied_p: f64,
    pub edge: f64,
}

pub fn compute(inputs: &ConfidenceInputs) -> crate::domain::ConfidenceResult {
    let mut penalties: BTreeMap<String, f64> = BTreeMap::new();

    let base = inputs.projection.projected_probability * 100.0;
    let cap = sample_size_cap(inputs.projection.evidence.sample_size);

    let after_shrinkage = shrink_toward_league_mean(inputs.projection.projected_probability, inputs.projection.evidence.sample_size) * 100.0;

    let mut running = after_shrinkage.min(cap);

    let vol_penalty = volatility_penalty(inputs.projection.evidence.volatility_cv);
    if vol_penalty != 0.0 {
        penalties.insert("volatility".to_string(), vol_penalty);
        running += vol_penalty;
    }

    if inputs.role_trend != RoleTrend::Stable {
        penalties.insert("role_change".to_string(), -15.0);
        running -= 15.0;
        if inputs.minutes_variance_fraction > 0.20 {
            penalties.insert("minutes_volatility".to_string(), -5.0);
            running -= 5.0;
        }
    } else if inputs.minutes_variance_fraction > 0.20 {
        penalties.insert("minutes_volatility".to_string(), -5.0);
        running -= 5.0;
    }

    let matchup_adjustment = (inputs.matchup.total_adjustment * 50.0).clamp(-10.0, 10.0);
    if matchup_adjustment != 0.0 {
        penalties.insert("matchup".to_string(), matchup_adjustment);
        running += matchup_adjustment;
    }

    if inputs.stat == Stat::Points {
        let line_penalty = if inputs.line >= 35.0 {
            -10.0
        } else if inputs.line >= 30.0 {
            -5.0
        } else {
            0.0
        };
        if line_penalty != 0.0 {
            penalties.insert("line_difficulty".to_string(), line_penalty);
            running += line_penalty;
        }
    }

    if inputs.projection.disagreement > 0.10 {
        penalties.insert("disagreement".to_string(), -5.0);
        running -= 5.0;
    }

    let suppress_in_efficient_zone =
        inputs.edge < 0.03 && (0.55..=0.60).contains(&inputs.implied_p) && running < 85.0;
    if suppress_in_efficient_zone {
        penalties.insert("suppress_in_efficient_zone".to_string(), 0.0);
    }

    let final_score = running.clamp(0.0, 95.0);

    let high_severity = penalties.values().filter(|v| **v <= -10.0).count();
    let risk = if final_score < 50.0 || high_severity >= 3 {
        RiskClass::Extreme
    } else if final_score < 60.0 || high_severity == 2 {
        RiskClass::High
    } else if final_score < 70.0 || high_severity == 1 {
        RiskClass::Medium
    } else {
        RiskClass::Low
    };

    crate::domain::ConfidenceResult {
        base,
        after_shrinkage,
        final_score,
        penalties,
        risk,
        multi_safe: matches!(risk, RiskClass::Low | RiskClass::Medium),
    }
}
