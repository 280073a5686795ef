use crate::domain::{Market, Side, Stat};

/// A small set of team names used only to reject insights whose subject is
/// a team rather than a player (§4.1). Real team rosters vary by season;
/// this is deliberately the minimal set needed to disambiguate "Lakers
/// over 110.5 points" (a team total) from "James over 27.5 points" (a
/// player prop) — anything broader belongs to an external collaborator
/// that actually tracks league rosters.
const KNOWN_TEAM_NAMES: &[&str] = &[
    "lakers", "celtics", "warriors", "nets", "knicks", "bulls", "heat", "suns", "nuggets",
    "bucks", "mavericks", "clippers", "76ers", "sixers", "raptors", "hawks", "hornets",
    "cavaliers", "pistons", "pacers", "magic", "wizards", "grizzlies", "pelicans", "spurs",
    "thunder", "trail blazers", "blazers", "jazz", "kings", "rockets", "timberwolves",
];

/// Stat keywords the engine recognizes, used both to locate the stat in
/// free text and to guard against a stat keyword being mistaken for the
/// player name (§4.1: "player-name regex match overlaps a stat keyword").
const STAT_KEYWORDS: &[(&str, Stat)] = &[
    ("points", Stat::Points),
    ("pts", Stat::Points),
    ("rebounds", Stat::Rebounds),
    ("reb", Stat::Rebounds),
    ("assists", Stat::Assists),
    ("ast", Stat::Assists),
    ("threes", Stat::Threes),
    ("3pm", Stat::Threes),
    ("blocks", Stat::Blocks),
    ("blk", Stat::Blocks),
    ("steals", Stat::Steals),
    ("stl", Stat::Steals),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProp {
    pub player_name: String,
    pub stat: Stat,
    pub side: Side,
    pub line: f64,
}

/// Deterministically extracts {player_name, stat, side, line} from a
/// free-text insight (§4.1). Returns `None` (not an error) whenever the
/// text doesn't look like a player prop — a team-market or unparseable
/// insight is simply not a prop, which is exactly what "optional" means
/// here.
pub fn parse_player_prop_insight(text: &str, market: &Market) -> Option<ParsedProp> {
    if market_is_team_market(market) {
        return None;
    }

    let lower = text.to_ascii_lowercase();

    let (stat_kw, stat) = STAT_KEYWORDS.iter().find(|(kw, _)| lower.contains(kw))?;
    let side = if lower.contains("over") {
        Side::Over
    } else if lower.contains("under") {
        Side::Under
    } else {
        return None;
    };

    let line = extract_line(&lower)?;

    let player_name = extract_player_name(text, stat_kw)?;
    if player_name.is_empty() {
        return None;
    }
    let lower_name = player_name.to_ascii_lowercase();
    if KNOWN_TEAM_NAMES.iter().any(|team| lower_name == *team) {
        return None;
    }
    if STAT_KEYWORDS.iter().any(|(kw, _)| lower_name == *kw) {
        return None;
    }

    Some(ParsedProp {
        player_name,
        stat: *stat,
        side,
        line,
    })
}

fn market_is_team_market(market: &Market) -> bool {
    !market.is_player_prop()
}

/// Pulls the first decimal number out of the text, treated as the line.
fn extract_line(lower: &str) -> Option<f64> {
    let mut current = String::new();
    let mut candidates = Vec::new();
    for ch in lower.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_digit() || ch == '.' {
            current.push(ch);
        } else if !current.is_empty() {
            if let Ok(v) = current.parse::<f64>() {
                candidates.push(v);
            }
            current.clear();
        }
    }
    candidates.into_iter().next()
}

/// Everything before the stat keyword, with trailing side words and
/// punctuation stripped, is taken as the player name candidate.
fn extract_player_name(text: &str, stat_kw: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let idx = lower.find(stat_kw)?;
    let prefix = &text[..idx];

    let mut name = prefix.trim().trim_end_matches(|c: char| c == ':' || c == '-').to_string();

    // Drop a trailing number (the line itself, if it preceded the stat word).
    while name.chars().last().is_some_and(|c| c.is_ascii_digit() || c == '.') {
        name.pop();
    }
    name = name.trim().to_string();

    for side_word in ["over", "under", "Over", "Under"] {
        if let Some(stripped) = name.strip_suffix(side_word) {
            name = stripped.trim().to_string();
        }
    }
    let name = name.trim().trim_end_matches(|c: char| !c.is_alphanumeric()).to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Normalizes a player name into a stable lookup key (§6 E3):
/// lowercase, `.`/`-` stripped (the latter to a space), whitespace
/// collapsed, suffixes {jr, sr, ii, iii, iv} removed, and any
/// occurrence of the substring " to" stripped before the rest of the
/// normalization runs.
pub fn normalize_player_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let with_to_stripped = lower.replace(" to", "");

    let mut cleaned = String::with_capacity(with_to_stripped.len());
    for ch in with_to_stripped.chars() {
        match ch {
            '.' => {}
            '-' => cleaned.push(' '),
            other => cleaned.push(other),
        }
    }

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();

    const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];
    if let Some(last) = words.last() {
        if SUFFIXES.contains(last) {
            words.pop();
        }
    }

    words.join(" ")
}
