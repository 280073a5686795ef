//! Core value types (§3). All are plain data; derived types are produced by
//! pure functions of their inputs and never mutated in place.

pub mod confidence;
pub mod evidence;
pub mod game;
pub mod market;
pub mod matchup;
pub mod projection;
pub mod recommendation;
pub mod value;

pub use confidence::{ConfidenceResult, RiskClass};
pub use evidence::{GameLogEntry, GameResult, PlayerContext, RoleTrend, TeamForm};
pub use game::Game;
pub use market::{InvalidOdds, Market, Odds, Side, Stat};
pub use matchup::MatchupFactors;
pub use projection::{Evidence, ProjectionMethod, ProjectionResult};
pub use recommendation::{Recommendation, Tier};
pub use value::ValueResult;
