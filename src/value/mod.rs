//! Value & Validation — C8 (§4.8). Fair odds, edge, EV, and the invariant
//! recheck that repairs or rejects a mismatched upstream-reported EV.
//! Grounded on `vault/kelly.rs::calculate_kelly_position`'s explicit
//! early-return validation style and `arbitrage/engine.rs`'s
//! compute-then-validate profit pipeline.

use crate::domain::{Odds, ValueResult};
use crate::error::IntegrityError;

/// I1 mismatch bands (§4.8): above `NOTE_THRESHOLD` the EV is recomputed
/// and noted; above `HARD_THRESHOLD` it is also a hard integrity failure.
const EV_NOTE_THRESHOLD: f64 = 0.001;
const EV_HARD_THRESHOLD: f64 = 0.01;

pub struct ValueComputation {
    pub value: ValueResult,
    pub notes: Vec<String>,
    pub integrity_error: Option<IntegrityError>,
}

/// Computes `ValueResult` from a probability and decimal odds. Returns
/// `None` when `p <= 0` (`fair_odds` is undefined there, §4.8), which the
/// caller treats as "discard the recommendation".
///
/// `reported_ev`, when given, is an already-computed EV the caller received
/// from upstream (or an earlier stage); it is checked against the freshly
/// computed value per I1 rather than trusted outright.
pub fn compute(p: f64, odds: Odds, reported_ev: Option<f64>) -> Option<ValueComputation> {
    if !(p > 0.0) {
        return None;
    }

    let fair_odds = 1.0 / p;
    let implied_p = 1.0 / odds.value();
    let edge = p - implied_p;
    let ev = p * odds.value() - 1.0;
    let mispricing = odds.value() - fair_odds;
    let ev_per_prob = ev / p;

    let mut notes = Vec::new();
    let mut integrity_error = None;

    if let Some(reported) = reported_ev {
        let mismatch = (reported - ev).abs();
        if mismatch > EV_HARD_THRESHOLD {
            integrity_error = Some(IntegrityError {
                invariant: "I1",
                detail: format!("reported ev {reported:.4} vs recomputed {ev:.4} (mismatch {mismatch:.4})"),
            });
            notes.push("EVRecomputed".to_string());
        } else if mismatch > EV_NOTE_THRESHOLD {
            notes.push("EVRecomputed".to_string());
        }
    }

    Some(ValueComputation {
        value: ValueResult { fair_odds, odds: odds.value(), mispricing, implied_p, edge, ev, ev_per_prob },
        notes,
        integrity_error,
    })
}

/// Whether `value`/`p` would clear the S-tier bar on their own (§4.9),
/// used only to decide whether the `ev_per_prob` floor in the third
/// pre-tier filter applies.
fn s_tier_eligible(p: f64, value: &ValueResult) -> bool {
    value.ev >= 0.20 && value.edge >= 0.12 && p >= 0.68
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub keep: bool,
    pub reason: Option<&'static str>,
}

/// Pre-tier filters (§4.8), applied after `compute` and before tiering.
/// `watchlist` is the caller's flag for a recommendation explicitly marked
/// as a watchlist candidate, which exempts it from the `p >= 0.50` floor.
pub fn pre_tier_filter(p: f64, value: &ValueResult, watchlist: bool) -> FilterOutcome {
    if value.edge <= 0.0 {
        return FilterOutcome { keep: false, reason: Some("edge <= 0") };
    }
    if p < 0.50 && !watchlist {
        return FilterOutcome { keep: false, reason: Some("p < 0.50 and not watchlisted") };
    }
    if value.ev_per_prob < 0.08 && !s_tier_eligible(p, value) {
        return FilterOutcome { keep: false, reason: Some("ev_per_prob < 0.08 and not S-eligible") };
    }
    FilterOutcome { keep: true, reason: None }
}
