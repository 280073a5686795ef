use serde::{Deserialize, Serialize};
use std::fmt;

/// The stat families a PlayerProp market can reference (§6 E1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Points,
    Rebounds,
    Assists,
    Threes,
    Blocks,
    Steals,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Points => "points",
            Stat::Rebounds => "rebounds",
            Stat::Assists => "assists",
            Stat::Threes => "threes",
            Stat::Blocks => "blocks",
            Stat::Steals => "steals",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "points" | "pts" => Some(Stat::Points),
            "rebounds" | "reb" | "rebs" => Some(Stat::Rebounds),
            "assists" | "ast" | "asts" => Some(Stat::Assists),
            "threes" | "three_pointers" | "3pm" | "threes_made" => Some(Stat::Threes),
            "blocks" | "blk" | "blks" => Some(Stat::Blocks),
            "steals" | "stl" | "stls" => Some(Stat::Steals),
            _ => None,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A market side. PlayerProp/Total use Over/Under; Spread/Moneyline use
/// Home/Away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Over,
    Under,
    Home,
    Away,
}

/// A tagged market variant (§3). No dispatch-by-class-name: callers match
/// on the enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Market {
    MoneylineAway,
    MoneylineHome,
    Spread { side: Side, line: f64 },
    Total { side: Side, line: f64 },
    PlayerProp {
        player_id: String,
        stat: Stat,
        side: Side,
        line: f64,
    },
}

impl Market {
    /// A stable key for grouping recommendations on the same market, used
    /// by correlation control (§4.9) and as `ProjectionResult::market_key`.
    pub fn key(&self) -> String {
        match self {
            Market::MoneylineAway => "moneyline_away".to_string(),
            Market::MoneylineHome => "moneyline_home".to_string(),
            Market::Spread { side, line } => format!("spread_{:?}_{}", side, line),
            Market::Total { side, line } => format!("total_{:?}_{}", side, line),
            Market::PlayerProp { player_id, stat, side, line } => {
                format!("prop_{}_{}_{:?}_{}", player_id, stat.as_str(), side, line)
            }
        }
    }

    pub fn is_player_prop(&self) -> bool {
        matches!(self, Market::PlayerProp { .. })
    }

    pub fn stat_family(&self) -> Option<Stat> {
        match self {
            Market::PlayerProp { stat, .. } => Some(*stat),
            _ => None,
        }
    }
}

/// Maps a whole-number phrasing ("4+") to the stored half-integer line
/// convention (§4.1): `line = k - 0.5`.
pub fn whole_number_line(k: f64) -> f64 {
    k - 0.5
}

/// Decimal odds, always strictly greater than 1.0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Odds(f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOdds;

impl fmt::Display for InvalidOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "odds must be strictly greater than 1.0")
    }
}
impl std::error::Error for InvalidOdds {}

impl Odds {
    pub fn new(value: f64) -> Result<Self, InvalidOdds> {
        if value.is_finite() && value > 1.0 {
            Ok(Self(value))
        } else {
            Err(InvalidOdds)
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_number_maps_to_half_line() {
        assert_eq!(whole_number_line(4.0), 3.5);
    }

    #[test]
    fn odds_rejects_non_positive_edge() {
        assert!(Odds::new(1.0).is_err());
        assert!(Odds::new(0.5).is_err());
        assert!(Odds::new(f64::NAN).is_err());
        assert!(Odds::new(1.9).is_ok());
    }

    #[test]
    fn stat_from_str_loose_covers_common_aliases() {
        assert_eq!(Stat::from_str_loose("PTS"), Some(Stat::Points));
        assert_eq!(Stat::from_str_loose("threes"), Some(Stat::Threes));
        assert_eq!(Stat::from_str_loose("nonsense"), None);
    }
}
