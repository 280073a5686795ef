use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::confidence::ConfidenceResult;
use super::game::Game;
use super::market::{Market, Odds};
use super::matchup::MatchupFactors;
use super::projection::ProjectionResult;
use super::value::ValueResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
}

impl Tier {
    /// Tier rank for output ordering (§4.4): lower is better, S first.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::S => 0,
            Tier::A => 1,
            Tier::B => 2,
            Tier::C => 3,
            Tier::D => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub game: Game,
    pub market: Market,
    pub odds: Odds,
    pub projection: ProjectionResult,
    pub matchup: MatchupFactors,
    pub confidence: ConfidenceResult,
    pub value: ValueResult,
    pub tier: Tier,
    pub warnings: BTreeSet<String>,
    pub notes: BTreeSet<String>,
    pub final_score: f64,
}

impl Recommendation {
    /// Output ordering key (§4.4): (tier rank, final_score desc,
    /// projected_probability desc, tip_time asc).
    pub fn ordering_key(&self) -> (u8, i64, i64, i64) {
        (
            self.tier.rank(),
            -(self.final_score * 1_000.0) as i64,
            -(self.projection.projected_probability * 1_000_000.0) as i64,
            self.game.tip_time.timestamp(),
        )
    }
}
