use tracing::debug;

use crate::domain::{Game, Market, Odds, Side, Stat};
use crate::error::AdapterError;

/// One raw (market, odds) row from a markets payload, prior to validation.
#[derive(Debug, Clone)]
pub struct RawMarketQuote {
    pub market_name: String,
    pub stat: Option<String>,
    pub side: Option<String>,
    /// The phrased line, e.g. 23.5, or a whole-number phrasing like 4.0
    /// for "4+" markets (see `whole_number` below).
    pub line: Option<f64>,
    /// True when this line was phrased as a whole-number threshold ("4+")
    /// rather than an already-half-integer line ("23.5").
    pub whole_number: bool,
    pub player_id: Option<String>,
    pub odds: f64,
}

/// Converts a raw markets payload into validated (Market, Odds) pairs for
/// one game (§4.1). Enforces `odds > 1.0`, maps whole-number phrasings to
/// `line = k - 0.5`, and silently drops any market whose fingerprint isn't
/// in the recognized set (§6), recording a debug note rather than failing
/// the whole payload — one malformed row shouldn't sink the rest.
pub fn parse_markets(payload: &[RawMarketQuote], _game: &Game) -> Result<Vec<(Market, Odds)>, AdapterError> {
    let mut out = Vec::with_capacity(payload.len());

    for row in payload {
        let odds = match Odds::new(row.odds) {
            Ok(o) => o,
            Err(_) => {
                debug!(market = %row.market_name, odds = row.odds, "dropping market with non-recognized odds");
                continue;
            }
        };

        let Some(market) = recognize(row) else {
            debug!(market = %row.market_name, "dropping unrecognized market fingerprint");
            continue;
        };

        out.push((market, odds));
    }

    Ok(out)
}

fn recognize(row: &RawMarketQuote) -> Option<Market> {
    let line = |row: &RawMarketQuote| -> Option<f64> {
        let raw = row.line?;
        Some(if row.whole_number { crate::domain::market::whole_number_line(raw) } else { raw })
    };

    let side = |s: &str| -> Option<Side> {
        match s.to_ascii_lowercase().as_str() {
            "over" => Some(Side::Over),
            "under" => Some(Side::Under),
            "home" => Some(Side::Home),
            "away" => Some(Side::Away),
            _ => None,
        }
    };

    match row.market_name.to_ascii_lowercase().as_str() {
        "moneyline_away" => Some(Market::MoneylineAway),
        "moneyline_home" => Some(Market::MoneylineHome),
        "spread" => Some(Market::Spread { side: side(row.side.as_deref()?)?, line: line(row)? }),
        "total" => Some(Market::Total { side: side(row.side.as_deref()?)?, line: line(row)? }),
        "player_prop" => {
            let stat = Stat::from_str_loose(row.stat.as_deref()?)?;
            let side = side(row.side.as_deref()?)?;
            if !matches!(side, Side::Over | Side::Under) {
                return None;
            }
            Some(Market::PlayerProp {
                player_id: row.player_id.clone()?,
                stat,
                side,
                line: line(row)?,
            })
        }
        _ => None,
    }
}
