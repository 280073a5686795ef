use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::Stat;

/// One row of a player's game log (§3). `stat_values` holds whatever stat
/// families the upstream reported for that game; a missing key just means
/// that path has less evidence to work with, not a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLogEntry {
    pub date: DateTime<Utc>,
    pub opponent: String,
    pub is_home: bool,
    pub minutes_played: f64,
    pub stat_values: HashMap<Stat, f64>,
    pub win: bool,
}

/// Role-trend classification feeding the confidence engine's role-change
/// penalty (§4.7 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTrend {
    Stable,
    Rising,
    Falling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerContext {
    pub player_id: String,
    pub display_name: String,
    pub team_id: String,
    /// Ordered, most recent last.
    pub recent_minutes_window: Vec<f64>,
    pub role_trend: RoleTrend,
}

impl PlayerContext {
    /// Variance of recent minutes as a fraction of their mean; used by the
    /// confidence engine's "minutes variance > 20% of recent mean" check.
    pub fn minutes_variance_fraction(&self) -> f64 {
        let n = self.recent_minutes_window.len();
        if n < 2 {
            return 0.0;
        }
        let mean: f64 = self.recent_minutes_window.iter().sum::<f64>() / n as f64;
        if mean <= 0.0 {
            return 0.0;
        }
        let variance: f64 = self
            .recent_minutes_window
            .iter()
            .map(|m| (m - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        variance.sqrt() / mean
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamForm {
    pub team_id: String,
    /// Ordered, most recent last.
    pub last_k_results: Vec<GameResult>,
    pub points_for_avg: f64,
    pub points_against_avg: f64,
    pub pace_estimate: f64,
    pub home_away_split: f64,
}

impl TeamForm {
    /// Scalar team-strength index used by the matchup engine's blowout-risk
    /// calculation (§4.5). Positive means stronger than average.
    pub fn strength_index(&self) -> f64 {
        self.points_for_avg - self.points_against_avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_variance_fraction_is_zero_for_constant_minutes() {
        let ctx = PlayerContext {
            player_id: "p1".into(),
            display_name: "Player One".into(),
            team_id: "t1".into(),
            recent_minutes_window: vec![30.0, 30.0, 30.0],
            role_trend: RoleTrend::Stable,
        };
        assert_eq!(ctx.minutes_variance_fraction(), 0.0);
    }

    #[test]
    fn minutes_variance_fraction_reflects_spread() {
        let ctx = PlayerContext {
            player_id: "p1".into(),
            display_name: "Player One".into(),
            team_id: "t1".into(),
            recent_minutes_window: vec![20.0, 40.0],
            role_trend: RoleTrend::Falling,
        };
        assert!(ctx.minutes_variance_fraction() > 0.3);
    }
}
