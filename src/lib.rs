//! Basketball prop decision pipeline: per-player projection, confidence
//! scoring, value/EV computation, and tiered recommendations over a
//! bounded-concurrency fan-out across a slate of games.

pub mod adapters;
pub mod cache;
pub mod confidence;
pub mod config;
pub mod domain;
pub mod error;
pub mod matchup;
pub mod orchestrator;
pub mod pipeline;
pub mod projection;
pub mod retry;
pub mod tiering;
pub mod value;

pub use config::PipelineConfig;
pub use domain::{Game, Market, Odds, Recommendation, Side, Stat, Tier};
pub use error::PipelineError;
pub use pipeline::{analyze, health_snapshot, validate, CandidateMarket, EvidenceSource, GameContext, HealthSnapshot, Invariant, RunInput, RunOutput, Services, ValidationResult};
