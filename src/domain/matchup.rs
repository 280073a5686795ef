use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchupFactors {
    pub pace_multiplier: f64,
    pub defense_multiplier: f64,
    pub blowout_risk: f64,
    pub total_adjustment: f64,
    pub favorable: bool,
    pub opponent_rank_for_stat: u32,
}
