use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An upcoming game. Identity is (tip_time, away_team, home_team), not a
/// surrogate key — two payloads that agree on all three fields are the
/// same game, regardless of what the upstream called it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub tip_time: DateTime<Utc>,
    pub away_team: String,
    pub home_team: String,
}

impl Game {
    pub fn new(game_id: impl Into<String>, tip_time: DateTime<Utc>, away_team: impl Into<String>, home_team: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            tip_time,
            away_team: away_team.into(),
            home_team: home_team.into(),
        }
    }

    /// The tuple that defines identity, per the data model (§3).
    pub fn identity_key(&self) -> (DateTime<Utc>, &str, &str) {
        (self.tip_time, &self.away_team, &self.home_team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identity_ignores_game_id() {
        let tip = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let a = Game::new("a", tip, "Lakers", "Celtics");
        let b = Game::new("b", tip, "Lakers", "Celtics");
        assert_eq!(a.identity_key(), b.identity_key());
    }
}
