//! Evidence Adapters — C1 (§4.1). Each function here converts one upstream
//! payload shape into internal value types. All are total: the only failure
//! mode is a returned `AdapterError`, never a panic or an escaped
//! exception, matching the teacher's parse-function convention in
//! `scrapers/dome.rs` / `scrapers/polymarket_api.rs`.

pub mod game_list;
pub mod game_log;
pub mod markets;
pub mod prop_insight;

pub use game_list::parse_game_list;
pub use game_log::parse_game_log;
pub use markets::parse_markets;
pub use prop_insight::{normalize_player_name, parse_player_prop_insight, ParsedProp};
