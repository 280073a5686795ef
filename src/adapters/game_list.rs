use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::domain::Game;
use crate::error::{AdapterError, BadUpstream};

/// One row of a raw game-list payload, already lifted out of whatever
/// wire format the upstream used (JSON, a scraped table, ...). Adapting
/// *that* format is an external collaborator's job (§1); this is the
/// contract the core requires (§6 E1).
#[derive(Debug, Clone)]
pub struct RawGameListing {
    pub game_id: String,
    pub tip_time: DateTime<Utc>,
    pub away_team: String,
    pub home_team: String,
}

/// Converts a raw game-list payload into an ordered sequence of `Game`,
/// failing with `BadUpstream` if two entries collide on
/// (tip_time, away_team, home_team) (§4.1).
pub fn parse_game_list(payload: &[RawGameListing]) -> Result<Vec<Game>, AdapterError> {
    let mut seen: HashSet<(DateTime<Utc>, String, String)> = HashSet::with_capacity(payload.len());
    let mut games = Vec::with_capacity(payload.len());

    for row in payload {
        let key = (row.tip_time, row.away_team.clone(), row.home_team.clone());
        if !seen.insert(key) {
            return Err(AdapterError::BadUpstream(BadUpstream {
                reason: "duplicate (tip_time, away_team, home_team)".to_string(),
                excerpt: format!("{} @ {} on {}", row.away_team, row.home_team, row.tip_time),
            }));
        }
        games.push(Game::new(row.game_id.clone(), row.tip_time, row.away_team.clone(), row.home_team.clone()));
    }

    Ok(games)
}
