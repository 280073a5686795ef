use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::domain::{GameLogEntry, Stat};
use crate::error::AdapterError;

/// One raw row of a player's game log payload, prior to dedup/sort.
#[derive(Debug, Clone)]
pub struct RawGameLogRow {
    pub date: DateTime<Utc>,
    pub opponent: String,
    pub is_home: bool,
    pub minutes_played: f64,
    pub stat_values: HashMap<Stat, f64>,
    pub win: bool,
}

/// Converts a raw game-log payload into an ordered, deduplicated sequence
/// of `GameLogEntry` (§4.1): deduplicates by date (last entry for a given
/// date wins, since upstreams occasionally resend a corrected row), sorts
/// ascending.
pub fn parse_game_log(payload: &[RawGameLogRow]) -> Result<Vec<GameLogEntry>, AdapterError> {
    let mut by_date: HashMap<DateTime<Utc>, GameLogEntry> = HashMap::with_capacity(payload.len());
    let mut order: Vec<DateTime<Utc>> = Vec::with_capacity(payload.len());
    let mut seen: HashSet<DateTime<Utc>> = HashSet::with_capacity(payload.len());

    for row in payload {
        if seen.insert(row.date) {
            order.push(row.date);
        }
        by_date.insert(
            row.date,
            GameLogEntry {
                date: row.date,
                opponent: row.opponent.clone(),
                is_home: row.is_home,
                minutes_played: row.minutes_played,
                stat_values: row.stat_values.clone(),
                win: row.win,
            },
        );
    }

    order.sort();
    Ok(order.into_iter().map(|d| by_date.remove(&d).expect("key inserted above")).collect())
}

/// Restricts a game log to the configured recency horizon (§6 E3): default
/// 60 games or 120 days, whichever is more restrictive.
pub fn apply_horizon(log: &[GameLogEntry], now: DateTime<Utc>, max_games: usize, max_days: i64) -> Vec<GameLogEntry> {
    let cutoff = now - chrono::Duration::days(max_days);
    let within_days: Vec<&GameLogEntry> = log.iter().filter(|e| e.date >= cutoff).collect();
    let start = within_days.len().saturating_sub(max_games);
    within_days[start..].iter().map(|e| (*e).clone()).collect()
}
