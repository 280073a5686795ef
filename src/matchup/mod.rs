//! Matchup Engine — C5 (§4.5). Pure functions of team-form inputs; no I/O,
//! no suspension points. Grounded on the clamp-heavy numeric style of
//! `risk.rs` (`.clamp(...)`, `.max(0.0)` guards throughout
//! `KellyCalculator`/`VaRCalculator`) applied to a small, deterministic
//! calculation module rather than a risk-sizing one.

use std::collections::HashMap;

use crate::domain::MatchupFactors;

const MULTIPLIER_LOW: f64 = 0.85;
const MULTIPLIER_HIGH: f64 = 1.15;
const LEAGUE_MEAN: f64 = 1.00;

/// Per-matchup scalar inputs a caller has already resolved from TeamForm
/// and the per-stat-allowed table (§6 E2). Missing league-table entries
/// should be passed through as `LEAGUE_MEAN` (1.00) by the caller; this
/// module only records the note when that happens via `compute`'s
/// `used_league_mean_*` flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchupInputs {
    pub team_pace: Option<f64>,
    pub opponent_pace: Option<f64>,
    pub league_pace: f64,
    pub opponent_allowed: Option<f64>,
    pub league_allowed: f64,
    pub team_strength: f64,
    pub opponent_strength: f64,
}

pub fn pace_multiplier(team_pace: f64, opponent_pace: f64, league_pace: f64) -> f64 {
    if league_pace <= 0.0 {
        return LEAGUE_MEAN;
    }
    (((team_pace + opponent_pace) / 2.0) / league_pace).clamp(MULTIPLIER_LOW, MULTIPLIER_HIGH)
}

pub fn defense_multiplier(opponent_allowed: f64, league_allowed: f64) -> f64 {
    if league_allowed <= 0.0 {
        return LEAGUE_MEAN;
    }
    (opponent_allowed / league_allowed).clamp(MULTIPLIER_LOW, MULTIPLIER_HIGH)
}

/// §4.5: 0.92 beyond a 10-point strength gap, 0.96 beyond 5, else 1.00.
pub fn blowout_risk(strength_diff: f64) -> f64 {
    let gap = strength_diff.abs();
    if gap > 10.0 {
        0.92
    } else if gap > 5.0 {
        0.96
    } else {
        1.00
    }
}

pub fn total_multiplier(pace: f64, defense: f64, blowout: f64) -> f64 {
    pace * defense * blowout
}

/// `(total_multiplier - 1) * 0.5`, clamped to keep the downstream
/// confidence-engine scaling (`probability_adjustment * 50`, §4.7) inside a
/// sane ±10-point swing even at the extremes of the multiplier ranges.
pub fn probability_adjustment(total_mult: f64) -> f64 {
    ((total_mult - 1.0) * 0.5).clamp(-0.20, 0.20)
}

/// Ranks teams 1..N by `defense_multiplier` (lower multiplier = stingier
/// defense = better rank = 1). Ties broken by `team_id` ascending (§4.5).
pub fn rank_opponents_by_defense(defense_multipliers: &[(String, f64)]) -> HashMap<String, u32> {
    let mut ordered: Vec<&(String, f64)> = defense_multipliers.iter().collect();
    ordered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (team_id, _))| (team_id.clone(), (i + 1) as u32))
        .collect()
}

/// Computes the full `MatchupFactors` for one (team, opponent, stat) triple,
/// falling back to the league mean for any missing input and returning a
/// note for each fallback applied (§4.5: "if any multiplier is missing, the
/// league mean (1.00) is used and a note is recorded in the evidence").
pub fn compute(inputs: &MatchupInputs, opponent_rank: u32) -> (MatchupFactors, Vec<String>) {
    let mut notes = Vec::new();

    let pace = match (inputs.team_pace, inputs.opponent_pace) {
        (Some(t), Some(o)) => pace_multiplier(t, o, inputs.league_pace),
        _ => {
            notes.push("pace_multiplier defaulted to league mean (missing input)".to_string());
            LEAGUE_MEAN
        }
    };

    let defense = match inputs.opponent_allowed {
        Some(allowed) => defense_multiplier(allowed, inputs.league_allowed),
        None => {
            notes.push("defense_multiplier defaulted to league mean (missing input)".to_string());
            LEAGUE_MEAN
        }
    };

    let strength_diff = inputs.team_strength - inputs.opponent_strength;
    let blowout = blowout_risk(strength_diff);
    let total = total_multiplier(pace, defense, blowout);
    let adjustment = probability_adjustment(total);

    let factors = MatchupFactors {
        pace_multiplier: pace,
        defense_multiplier: defense,
        blowout_risk: blowout,
        total_adjustment: adjustment,
        favorable: total > 1.00,
        opponent_rank_for_stat: opponent_rank,
    };

    (factors, notes)
}
