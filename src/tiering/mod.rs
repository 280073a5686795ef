//! Tiering & Correlation — C9 (§4.9). The S/A/B/C/D gate table, the
//! per-game PlayerProp correlation cap, and the cross-selection confidence
//! penalty. Grounded on `signals/quality.rs`'s corroboration-map pattern
//! (group by key, sort, keep top-K, demote the rest with a named reason).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{Recommendation, Stat, Tier};

/// Tier gates (§4.9), first match wins.
pub fn gate(p: f64, edge: f64, ev: f64, confidence_final: f64, mispricing: f64, sample_size: usize) -> Tier {
    if ev >= 0.20 && edge >= 0.12 && p >= 0.68 {
        Tier::S
    } else if ev >= 0.10 && edge >= 0.08 && p >= 0.75 {
        Tier::A
    } else if ev >= 0.05 && edge >= 0.04 {
        Tier::B
    } else if confidence_final >= 60.0 && edge >= 0.05 && mispricing >= 0.10 && sample_size >= 5 {
        Tier::C
    } else {
        Tier::D
    }
}

/// Used only for in-tier ordering (§4.9), not for gating.
pub fn final_score(ev: f64, confidence_final: f64, edge: f64) -> f64 {
    ev * 100.0 + confidence_final * 0.2 + edge * 50.0
}

fn correlated_pair_penalty(projection_margin: f64) -> f64 {
    let margin = projection_margin.abs();
    if margin < 2.0 {
        -10.0
    } else if margin < 4.0 {
        -6.0
    } else {
        -4.0
    }
}

type GameKey = (DateTime<Utc>, String, String);

/// Applies the global, cross-recommendation rules of §4.9: the per-game
/// PlayerProp correlation cap (top 2 by `projected_probability` survive;
/// the rest are demoted to C with `ExcessCorrelation`) and the correlated-
/// pair confidence penalty for any two selections sharing (Game, stat
/// family). Must run once over the *entire* run's recommendations, after
/// per-unit work (§4.4, §4.10) — never per-unit, since correlation is a
/// cross-game-unit concern only at the Game level, never across games.
pub fn apply_global_rules(mut recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut by_game: HashMap<GameKey, Vec<usize>> = HashMap::new();
    for (i, r) in recommendations.iter().enumerate() {
        if r.market.is_player_prop() {
            let (tip_time, away, home) = r.game.identity_key();
            by_game.entry((tip_time, away.to_string(), home.to_string())).or_default().push(i);
        }
    }

    for (_game, mut indices) in by_game {
        indices.sort_by(|&a, &b| {
            recommendations[b]
                .projection
                .projected_probability
                .partial_cmp(&recommendations[a].projection.projected_probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (rank, &idx) in indices.iter().enumerate() {
            if rank >= 2 {
                recommendations[idx].tier = Tier::C;
                recommendations[idx].notes.insert("ExcessCorrelation".to_string());
            }
        }

        let mut by_stat_family: HashMap<Option<Stat>, Vec<usize>> = HashMap::new();
        for &idx in &indices {
            by_stat_family.entry(recommendations[idx].market.stat_family()).or_default().push(idx);
        }

        for (_stat, mut family_indices) in by_stat_family {
            family_indices.sort_by(|&a, &b| {
                recommendations[b]
                    .projection
                    .projected_probability
                    .partial_cmp(&recommendations[a].projection.projected_probability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for &idx in family_indices.iter().skip(1) {
                let penalty = correlated_pair_penalty(recommendations[idx].projection.projection_margin);
                recommendations[idx].confidence.penalties.insert("correlated_pair".to_string(), penalty);
                recommendations[idx].confidence.final_score = (recommendations[idx].confidence.final_score + penalty).clamp(0.0, 95.0);
                let rec = &mut recommendations[idx];
                rec.final_score = final_score(rec.value.ev, rec.confidence.final_score, rec.value.edge);
            }
        }
    }

    recommendations
}
