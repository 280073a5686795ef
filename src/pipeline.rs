//! Pipeline Driver — C10 (§4.10). Composes C1–C9 behind `analyze`, plus the
//! standalone `validate`/`health_snapshot` entry points (§6 "Public API of
//! the core"). Grounded on `main.rs`'s top-level composition style
//! (construct sub-services once, fan work out, merge results) scaled down
//! to a single async call since this crate has no long-running server loop.
//!
//! The evidence-gathering side (C1, reaching an actual sportsbook or stats
//! provider) is a non-goal (§1); `EvidenceSource` is the contract a caller
//! supplies instead, matching §6's framing of external interfaces as
//! "specified only by the contract the core requires". Markets and player
//! evidence are fetched through the retry/circuit-breaker/rate-limiter
//! stack (C2/C3); team form is additionally TTL-cached per §6 E4 ("cache-
//! only, 24h TTL").
//!
//! Simplification note: the per-stat defense-allowed table of §6 E2 is
//! approximated here from each team's `points_against_avg` against a single
//! league constant, since `TeamForm` (§3) doesn't carry a full per-stat
//! breakdown and the contract doesn't fabricate one. `opponent_rank_for_stat`
//! is likewise computed only from the two teams in the game unit, not the
//! full league table, since only those two are in scope per unit; a
//! league-wide rank would be a global pass computed once per run, analogous
//! to §4.9's cross-recommendation correlation pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::adapters;
use crate::cache::{CircuitBreaker, TokenBucket, TtlCache};
use crate::config::{PipelineConfig, UpstreamLimits};
use crate::confidence::{self, ConfidenceInputs};
use crate::domain::{Game, GameLogEntry, Market, MatchupFactors, Odds, PlayerContext, Recommendation, Stat, TeamForm, Tier};
use crate::error::{OperationError, PipelineError, UnitError, UpstreamError};
use crate::matchup::{self, MatchupInputs};
use crate::orchestrator::{self, CancelToken};
use crate::projection::{self, ProjectionRequest};
use crate::retry;
use crate::tiering;
use crate::value;

const LEAGUE_PACE: f64 = 100.0;
const LEAGUE_POINTS_ALLOWED: f64 = 112.0;
const DEFAULT_EXPECTED_MINUTES: f64 = 24.0;
const BAYESIAN_RECENCY_K: usize = 10;

/// One recognized market quote plus whatever EV an upstream may already
/// have attached to it (checked, not trusted, by C8). `player_team_id` is
/// required to resolve home/away and opponent for `PlayerProp` markets.
#[derive(Debug, Clone)]
pub struct CandidateMarket {
    pub market: Market,
    pub odds: Odds,
    pub reported_ev: Option<f64>,
    pub watchlist: bool,
    pub player_team_id: Option<String>,
}

/// The external contract an evidence source must satisfy (§6). Implementing
/// it against a real sportsbook/stats provider is out of scope here (§1).
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn markets_and_insights(&self, game: &Game) -> Result<Vec<CandidateMarket>, OperationError>;
    /// `Ok(None)` means the player key is unknown to the upstream (§6 E3,
    /// `PlayerNotFound`) — a soft miss, not a retryable failure.
    async fn player_evidence(&self, player_id: &str) -> Result<Option<(PlayerContext, Vec<GameLogEntry>)>, OperationError>;
    async fn team_form(&self, team_id: &str) -> Result<TeamForm, OperationError>;
}

#[derive(Debug, Clone)]
pub struct GameContext {
    pub game: Game,
    pub home_team_id: String,
    pub away_team_id: String,
}

pub struct RunInput {
    pub games: Vec<GameContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub count: usize,
    pub mean_p: f64,
    pub mean_ev: f64,
    pub mean_confidence: f64,
    pub tier_counts: BTreeMap<Tier, usize>,
    pub ev_identity_violations: usize,
    pub sample_floor_violations: usize,
}

pub struct RunOutput {
    pub run_id: String,
    pub recommendations: Vec<Recommendation>,
    pub health: HealthSnapshot,
    pub errors: Vec<UnitError>,
    pub missing_players: Vec<String>,
}

/// Named invariants `validate` checks (§6, §8 P1-P6). Carries which one
/// failed rather than a bare boolean, so callers auditing after the fact
/// can tell an EV-identity miss from a tier-uniqueness miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    EvIdentity,
    ProbabilityRange,
    ConfidenceRange,
    FairOdds,
    SampleFloor,
    TierUniqueness,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub ok: bool,
    pub violations: Vec<Invariant>,
}

/// Checks P1-P6 (§8) against one Recommendation.
pub fn validate(r: &Recommendation) -> ValidationResult {
    let mut violations = Vec::new();

    if (r.value.ev - (r.projection.projected_probability * r.odds.value() - 1.0)).abs() > 1e-3 {
        violations.push(Invariant::EvIdentity);
    }
    if !(0.0..=1.0).contains(&r.projection.projected_probability) {
        violations.push(Invariant::ProbabilityRange);
    }
    if !(0.0..=95.0).contains(&r.confidence.final_score) {
        violations.push(Invariant::ConfidenceRange);
    }
    if r.projection.projected_probability > 0.0 {
        let expected_fair_odds = 1.0 / r.projection.projected_probability;
        if (r.value.fair_odds - expected_fair_odds).abs() > 1e-3 {
            violations.push(Invariant::FairOdds);
        }
    }
    if matches!(r.tier, Tier::S | Tier::A | Tier::B | Tier::C)
        && r.projection.evidence.sample_size < 5
        && !r.projection.evidence.model_only
    {
        violations.push(Invariant::SampleFloor);
    }
    // A correlation-cap demotion (§4.9) deliberately overrides the gate
    // table, so it's exempt from the uniqueness recheck.
    if !r.notes.contains("ExcessCorrelation") {
        let expected_tier = tiering::gate(
            r.projection.projected_probability,
            r.value.edge,
            r.value.ev,
            r.confidence.final_score,
            r.value.mispricing,
            r.projection.evidence.sample_size,
        );
        if expected_tier != r.tier {
            violations.push(Invariant::TierUniqueness);
        }
    }

    ValidationResult { ok: violations.is_empty(), violations }
}

/// Independently re-derives `ev_identity_violations`/`sample_floor_violations`
/// by re-running P1/P5 rather than trusting counters threaded through the
/// pipeline.
pub fn health_snapshot(recommendations: &[Recommendation]) -> HealthSnapshot {
    let count = recommendations.len();
    if count == 0 {
        return HealthSnapshot {
            count: 0,
            mean_p: 0.0,
            mean_ev: 0.0,
            mean_confidence: 0.0,
            tier_counts: BTreeMap::new(),
            ev_identity_violations: 0,
            sample_floor_violations: 0,
        };
    }

    let mean_p = recommendations.iter().map(|r| r.projection.projected_probability).sum::<f64>() / count as f64;
    let mean_ev = recommendations.iter().map(|r| r.value.ev).sum::<f64>() / count as f64;
    let mean_confidence = recommendations.iter().map(|r| r.confidence.final_score).sum::<f64>() / count as f64;

    let mut tier_counts = BTreeMap::new();
    for r in recommendations {
        *tier_counts.entry(r.tier).or_insert(0usize) += 1;
    }

    let ev_identity_violations = recommendations
        .iter()
        .filter(|r| (r.value.ev - (r.projection.projected_probability * r.odds.value() - 1.0)).abs() > 1e-3)
        .count();
    let sample_floor_violations = recommendations
        .iter()
        .filter(|r| {
            matches!(r.tier, Tier::S | Tier::A | Tier::B | Tier::C)
                && r.projection.evidence.sample_size < 5
                && !r.projection.evidence.model_only
        })
        .count();

    HealthSnapshot { count, mean_p, mean_ev, mean_confidence, tier_counts, ev_identity_violations, sample_floor_violations }
}

/// Per-upstream protection (rate limit, retry, circuit breaker) plus the
/// team-form TTL cache. One instance is shared across a whole `analyze`
/// run; callers construct it once and may reuse it across runs to get
/// cache hits (P10).
pub struct Services {
    source: Arc<dyn EvidenceSource>,
    config: PipelineConfig,
    markets_breaker: CircuitBreaker,
    game_log_breaker: CircuitBreaker,
    team_form_breaker: CircuitBreaker,
    markets_bucket: TokenBucket,
    game_log_bucket: TokenBucket,
    team_form_bucket: TokenBucket,
    team_form_cache: TtlCache<String, TeamForm>,
}

impl Services {
    pub fn new(source: Arc<dyn EvidenceSource>, config: PipelineConfig) -> Self {
        Self {
            markets_breaker: CircuitBreaker::new(config.circuit_breaker.failure_threshold, config.circuit_breaker.cooldown),
            game_log_breaker: CircuitBreaker::new(config.circuit_breaker.failure_threshold, config.circuit_breaker.cooldown),
            team_form_breaker: CircuitBreaker::new(config.circuit_breaker.failure_threshold, config.circuit_breaker.cooldown),
            markets_bucket: TokenBucket::new(UpstreamLimits::MARKETS),
            game_log_bucket: TokenBucket::new(UpstreamLimits::GAME_LOG),
            team_form_bucket: TokenBucket::new(UpstreamLimits::TEAM_FORM),
            team_form_cache: TtlCache::new(config.cache.ttl),
            source,
            config,
        }
    }
}

async fn protected<T, F, Fut>(
    bucket: &TokenBucket,
    breaker: &CircuitBreaker,
    policy: &crate::config::RetryPolicy,
    max_wait: Duration,
    op: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OperationError>>,
{
    bucket.acquire(max_wait).await?;
    retry::execute_with_retry(breaker, policy, op).await
}

async fn cached_team_form(team_id: &str, services: &Services) -> Result<TeamForm, UpstreamError> {
    if let Some(form) = services.team_form_cache.get(&team_id.to_string()) {
        return Ok(form);
    }
    let form = protected(
        &services.team_form_bucket,
        &services.team_form_breaker,
        &services.config.retry,
        services.config.upstream_timeout,
        || {
            let source = services.source.clone();
            let team_id = team_id.to_string();
            async move { source.team_form(&team_id).await }
        },
    )
    .await?;
    services.team_form_cache.put(team_id.to_string(), form.clone());
    Ok(form)
}

struct UnitResult {
    recommendations: Vec<Recommendation>,
    missing_players: Vec<String>,
}

async fn run_game_unit(ctx: GameContext, services: Arc<Services>) -> Result<UnitResult, UnitError> {
    let game_id = ctx.game.game_id.clone();

    let candidates = protected(
        &services.markets_bucket,
        &services.markets_breaker,
        &services.config.retry,
        services.config.upstream_timeout,
        || {
            let source = services.source.clone();
            let game = ctx.game.clone();
            async move { source.markets_and_insights(&game).await }
        },
    )
    .await
    .map_err(|e| UnitError { game_id: game_id.clone(), reason: e.to_string() })?;

    let home_form = cached_team_form(&ctx.home_team_id, &services)
        .await
        .map_err(|e| UnitError { game_id: game_id.clone(), reason: format!("home team form: {e}") })?;
    let away_form = cached_team_form(&ctx.away_team_id, &services)
        .await
        .map_err(|e| UnitError { game_id: game_id.clone(), reason: format!("away team form: {e}") })?;

    let dm_home = matchup::defense_multiplier(home_form.points_against_avg, LEAGUE_POINTS_ALLOWED);
    let dm_away = matchup::defense_multiplier(away_form.points_against_avg, LEAGUE_POINTS_ALLOWED);
    let ranks = matchup::rank_opponents_by_defense(&[(ctx.home_team_id.clone(), dm_home), (ctx.away_team_id.clone(), dm_away)]);

    let mut recommendations = Vec::new();
    let mut missing_players = Vec::new();
    let mut matchup_memo: HashMap<(String, Stat), MatchupFactors> = HashMap::new();

    for candidate in candidates {
        let (player_id, stat, side, line) = match &candidate.market {
            Market::PlayerProp { player_id, stat, side, line } => (player_id.clone(), *stat, *side, *line),
            _ => continue,
        };
        let Some(team_id) = candidate.player_team_id.clone() else {
            warn!(player_id = %player_id, "player prop candidate missing team_id, skipping");
            continue;
        };
        let is_home = team_id == ctx.home_team_id;
        let opponent_team_id = if is_home { ctx.away_team_id.clone() } else { ctx.home_team_id.clone() };

        let evidence = protected(
            &services.game_log_bucket,
            &services.game_log_breaker,
            &services.config.retry,
            services.config.upstream_timeout,
            || {
                let source = services.source.clone();
                let player_id = player_id.clone();
                async move { source.player_evidence(&player_id).await }
            },
        )
        .await;

        let (player_ctx, full_log) = match evidence {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                missing_players.push(player_id.clone());
                continue;
            }
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "player evidence fetch failed, dropping candidate");
                continue;
            }
        };

        let game_log = adapters::game_log::apply_horizon(
            &full_log,
            ctx.game.tip_time,
            services.config.game_log_horizon_games,
            services.config.game_log_horizon_days,
        );

        let (team_form_self, opponent_form) = if is_home { (&home_form, &away_form) } else { (&away_form, &home_form) };

        let factors = *matchup_memo.entry((opponent_team_id.clone(), stat)).or_insert_with(|| {
            let inputs = MatchupInputs {
                team_pace: Some(team_form_self.pace_estimate),
                opponent_pace: Some(opponent_form.pace_estimate),
                league_pace: LEAGUE_PACE,
                opponent_allowed: Some(opponent_form.points_against_avg),
                league_allowed: LEAGUE_POINTS_ALLOWED,
                team_strength: team_form_self.strength_index(),
                opponent_strength: opponent_form.strength_index(),
            };
            let opponent_rank = *ranks.get(&opponent_team_id).unwrap_or(&0);
            matchup::compute(&inputs, opponent_rank).0
        });

        let expected_minutes = if player_ctx.recent_minutes_window.is_empty() {
            DEFAULT_EXPECTED_MINUTES
        } else {
            player_ctx.recent_minutes_window.iter().sum::<f64>() / player_ctx.recent_minutes_window.len() as f64
        };

        let days_rest = game_log
            .last()
            .map(|entry| (ctx.game.tip_time.date_naive() - entry.date.date_naive()).num_days() as f64)
            .unwrap_or(2.0)
            .max(0.0);

        let request = ProjectionRequest {
            game_log: &game_log,
            stat,
            side,
            line,
            odds: candidate.odds,
            matchup: &factors,
            expected_minutes,
            days_rest,
            is_home,
            bayesian_recency_k: BAYESIAN_RECENCY_K,
            min_sample_size: services.config.min_sample_size,
            market_key: candidate.market.key(),
        };
        let projection_output = projection::project(&request);

        let implied_p = 1.0 / candidate.odds.value();
        let edge_estimate = projection_output.result.projected_probability - implied_p;

        let confidence_inputs = ConfidenceInputs {
            projection: &projection_output.result,
            matchup: &factors,
            stat,
            line,
            role_trend: player_ctx.role_trend,
            minutes_variance_fraction: player_ctx.minutes_variance_fraction(),
            implied_p,
            edge: edge_estimate,
        };
        let confidence_result = confidence::compute(&confidence_inputs);

        let Some(value_computation) =
            value::compute(projection_output.result.projected_probability, candidate.odds, candidate.reported_ev)
        else {
            continue;
        };

        let filter_outcome = value::pre_tier_filter(
            projection_output.result.projected_probability,
            &value_computation.value,
            candidate.watchlist,
        );
        if !filter_outcome.keep {
            continue;
        }

        let mut tier = tiering::gate(
            projection_output.result.projected_probability,
            value_computation.value.edge,
            value_computation.value.ev,
            confidence_result.final_score,
            value_computation.value.mispricing,
            projection_output.result.evidence.sample_size,
        );

        let mut notes: BTreeSet<String> = projection_output.notes.into_iter().collect();
        notes.extend(value_computation.notes.iter().cloned());
        if let Some(integrity) = value_computation.integrity_error {
            tier = Tier::D;
            notes.insert(integrity.to_string());
        }

        let mut warnings = BTreeSet::new();
        if confidence_result.penalties.contains_key("minutes_volatility") {
            warnings.insert("MinutesVolatility".to_string());
        }
        if confidence_result.penalties.contains_key("suppress_in_efficient_zone") {
            warnings.insert("SuppressInEfficientZone".to_string());
        }

        let final_score = tiering::final_score(value_computation.value.ev, confidence_result.final_score, value_computation.value.edge);

        recommendations.push(Recommendation {
            game: ctx.game.clone(),
            market: candidate.market.clone(),
            odds: candidate.odds,
            projection: projection_output.result,
            matchup: factors,
            confidence: confidence_result,
            value: value_computation.value,
            tier,
            warnings,
            notes,
            final_score,
        });
    }

    Ok(UnitResult { recommendations, missing_players })
}

/// `analyze(RunInput) -> RunOutput` (§4.10, §6). The only failure mode is
/// an invalid `RunInput` (§7): an empty game list with strict mode set.
pub async fn analyze(input: RunInput, services: Arc<Services>) -> Result<RunOutput, PipelineError> {
    if input.games.is_empty() && services.config.strict_mode {
        return Err(PipelineError::EmptyGameListStrictMode);
    }

    let run_id = Uuid::new_v4().to_string();
    let games: Vec<Game> = input.games.iter().map(|c| c.game.clone()).collect();
    let contexts: Arc<HashMap<String, GameContext>> =
        Arc::new(input.games.into_iter().map(|c| (c.game.game_id.clone(), c)).collect());

    let config = services.config.clone();
    let outcomes = orchestrator::run_units(games, &config, CancelToken::new(), move |game| {
        let services = services.clone();
        let contexts = contexts.clone();
        async move {
            let ctx = contexts.get(&game.game_id).expect("context present for every dispatched game").clone();
            run_game_unit(ctx, services).await
        }
    })
    .await;

    let mut recommendations = Vec::new();
    let mut errors = Vec::new();
    let mut missing_players = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(unit) => {
                recommendations.extend(unit.recommendations);
                missing_players.extend(unit.missing_players);
            }
            Err(e) => errors.push(e),
        }
    }

    // §4.9 is global: it runs once over the whole run's recommendations,
    // never per game unit.
    let mut recommendations = tiering::apply_global_rules(recommendations);
    recommendations.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));

    let health = health_snapshot(&recommendations);

    Ok(RunOutput { run_id, recommendations, health, errors, missing_players })
}
