//! End-to-end scenarios over `analyze` (§4.10, §8): partial-failure
//! tolerance, excess-correlation demotion, missing-player reporting, the
//! strict-mode empty-input error, deterministic output ordering, and
//! `HealthSnapshot` bookkeeping. Component-level numeric behavior
//! (projection combination, confidence penalties, EV identity repair,
//! tier gates) is exercised by the unit tests in their own modules; these
//! tests are about how the pieces compose through `Services`/`analyze`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use courtedge_core::domain::{GameLogEntry, GameResult, PlayerContext, RoleTrend, Stat, TeamForm};
use courtedge_core::error::OperationError;
use courtedge_core::{
    analyze, validate, CandidateMarket, EvidenceSource, Game, GameContext, Market, Odds, PipelineConfig,
    PipelineError, RunInput, Services, Side, Tier,
};

fn fast_config(strict_mode: bool) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.inter_unit_delay_min = Duration::ZERO;
    config.inter_unit_delay_max = Duration::ZERO;
    config.retry.base_delay = Duration::from_millis(1);
    config.circuit_breaker.cooldown = Duration::from_millis(1);
    config.upstream_timeout = Duration::from_secs(5);
    config.strict_mode = strict_mode;
    config
}

fn tip(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 19, 0, 0).unwrap()
}

fn team_form(team_id: &str, pace: f64, points_against_avg: f64) -> TeamForm {
    TeamForm {
        team_id: team_id.to_string(),
        last_k_results: vec![GameResult { won: true }, GameResult { won: false }],
        points_for_avg: 112.0,
        points_against_avg,
        pace_estimate: pace,
        home_away_split: 0.52,
    }
}

/// A player's game log with `stat` cycling through `values` (mean well
/// above `line` so the prop comfortably covers Over).
fn game_log(n: usize, stat: Stat, values: &[f64]) -> Vec<GameLogEntry> {
    (0..n)
        .map(|i| GameLogEntry {
            date: tip(1) - chrono::Duration::days((n - i) as i64),
            opponent: "OPP".to_string(),
            is_home: i % 2 == 0,
            minutes_played: 28.0,
            stat_values: HashMap::from([(stat, values[i % values.len()])]),
            win: i % 2 == 0,
        })
        .collect()
}

fn player_context(player_id: &str, team_id: &str) -> PlayerContext {
    PlayerContext {
        player_id: player_id.to_string(),
        display_name: player_id.to_string(),
        team_id: team_id.to_string(),
        recent_minutes_window: vec![27.0, 28.0, 29.0, 28.0, 26.0],
        role_trend: RoleTrend::Stable,
    }
}

/// A scripted evidence source: fixed markets/players/team forms per game,
/// with one optional game id whose markets call always fails transiently
/// (simulating an upstream stuck returning 429s, §8 scenario 6).
struct MockSource {
    markets: HashMap<String, Vec<CandidateMarket>>,
    players: HashMap<String, Option<(PlayerContext, Vec<GameLogEntry>)>>,
    team_forms: HashMap<String, TeamForm>,
    always_fail_markets_for: HashSet<String>,
}

#[async_trait]
impl EvidenceSource for MockSource {
    async fn markets_and_insights(&self, game: &Game) -> Result<Vec<CandidateMarket>, OperationError> {
        if self.always_fail_markets_for.contains(&game.game_id) {
            return Err(OperationError::Transient(courtedge_core::error::TransientCause::Http(429)));
        }
        Ok(self.markets.get(&game.game_id).cloned().unwrap_or_default())
    }

    async fn player_evidence(&self, player_id: &str) -> Result<Option<(PlayerContext, Vec<GameLogEntry>)>, OperationError> {
        Ok(self.players.get(player_id).cloned().unwrap_or(None))
    }

    async fn team_form(&self, team_id: &str) -> Result<TeamForm, OperationError> {
        self.team_forms
            .get(team_id)
            .cloned()
            .ok_or_else(|| OperationError::NonTransient(format!("unknown team {team_id}")))
    }
}

fn candidate_with_line(player_id: &str, team_id: &str, line: f64) -> CandidateMarket {
    CandidateMarket {
        market: Market::PlayerProp { player_id: player_id.to_string(), stat: Stat::Points, side: Side::Over, line },
        odds: Odds::new(1.9).unwrap(),
        reported_ev: None,
        watchlist: false,
        player_team_id: Some(team_id.to_string()),
    }
}

fn strong_candidate(player_id: &str, team_id: &str) -> CandidateMarket {
    candidate_with_line(player_id, team_id, 18.5)
}

fn strong_player_evidence(player_id: &str, team_id: &str) -> (PlayerContext, Vec<GameLogEntry>) {
    (player_context(player_id, team_id), game_log(20, Stat::Points, &[24.0, 26.0, 22.0, 28.0, 25.0]))
}

#[tokio::test(start_paused = true)]
async fn partial_failure_tolerance_keeps_other_games_and_records_the_failure() {
    let g1 = GameContext { game: Game::new("g1", tip(1), "Away1", "Home1"), home_team_id: "Home1".into(), away_team_id: "Away1".into() };
    let g2 = GameContext { game: Game::new("g2", tip(2), "Away2", "Home2"), home_team_id: "Home2".into(), away_team_id: "Away2".into() };
    let g3 = GameContext { game: Game::new("g3", tip(3), "Away3", "Home3"), home_team_id: "Home3".into(), away_team_id: "Away3".into() };

    let mut markets = HashMap::new();
    markets.insert("g1".to_string(), vec![strong_candidate("p1", "Home1")]);
    markets.insert("g3".to_string(), vec![strong_candidate("p3", "Home3")]);

    let mut players = HashMap::new();
    players.insert("p1".to_string(), Some(strong_player_evidence("p1", "Home1")));
    players.insert("p3".to_string(), Some(strong_player_evidence("p3", "Home3")));

    let mut team_forms = HashMap::new();
    for (id, pace, allowed) in [
        ("Home1", 101.0, 118.0),
        ("Away1", 99.0, 110.0),
        ("Home3", 101.0, 118.0),
        ("Away3", 99.0, 110.0),
    ] {
        team_forms.insert(id.to_string(), team_form(id, pace, allowed));
    }

    let source = Arc::new(MockSource {
        markets,
        players,
        team_forms,
        always_fail_markets_for: HashSet::from(["g2".to_string()]),
    });
    let services = Arc::new(Services::new(source, fast_config(false)));

    let output = analyze(RunInput { games: vec![g1, g2, g3] }, services).await.expect("analyze does not fail on unit errors");

    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].game_id, "g2");

    let game_ids: HashSet<&str> = output.recommendations.iter().map(|r| r.game.game_id.as_str()).collect();
    assert!(game_ids.contains("g1"));
    assert!(game_ids.contains("g3"));
    assert!(!game_ids.contains("g2"));
}

#[tokio::test(start_paused = true)]
async fn excess_correlation_demotes_the_third_playerprop_in_one_game() {
    let ctx = GameContext { game: Game::new("g1", tip(1), "Away", "Home"), home_team_id: "Home".into(), away_team_id: "Away".into() };

    // Shared line of 24.5: p1/p2 cover it by a wide, consistent margin
    // (their combined probability saturates near the top of the [0.02,
    // 0.98] clamp); p3 only just clears it, giving it a strictly lower
    // combined probability without failing any pre-tier filter on its
    // own. Only the correlation cap (§4.9, I6) should change any tier.
    let markets = HashMap::from([(
        "g1".to_string(),
        vec![candidate_with_line("p1", "Home", 24.5), candidate_with_line("p2", "Home", 24.5), candidate_with_line("p3", "Home", 24.5)],
    )]);

    let players = HashMap::from([
        ("p1".to_string(), Some((player_context("p1", "Home"), game_log(20, Stat::Points, &[30.0, 31.0, 29.0, 32.0, 30.0])))),
        ("p2".to_string(), Some((player_context("p2", "Home"), game_log(20, Stat::Points, &[27.0, 28.0, 26.0, 29.0, 27.0])))),
        ("p3".to_string(), Some((player_context("p3", "Home"), game_log(20, Stat::Points, &[25.0, 26.0, 23.0, 27.0, 24.0])))),
    ]);

    let team_forms = HashMap::from([
        ("Home".to_string(), team_form("Home", 101.0, 118.0)),
        ("Away".to_string(), team_form("Away", 99.0, 110.0)),
    ]);

    let source = Arc::new(MockSource { markets, players, team_forms, always_fail_markets_for: HashSet::new() });
    let services = Arc::new(Services::new(source, fast_config(false)));

    let output = analyze(RunInput { games: vec![ctx] }, services).await.unwrap();
    assert!(output.errors.is_empty());

    let mut props: Vec<_> = output.recommendations.iter().filter(|r| r.market.is_player_prop()).collect();
    assert_eq!(props.len(), 3);
    props.sort_by(|a, b| b.projection.projected_probability.partial_cmp(&a.projection.projected_probability).unwrap());

    assert!(!props[0].notes.contains("ExcessCorrelation"));
    assert!(!props[1].notes.contains("ExcessCorrelation"));
    assert_eq!(props[2].tier, Tier::C);
    assert!(props[2].notes.contains("ExcessCorrelation"));
}

#[tokio::test(start_paused = true)]
async fn unknown_player_is_reported_as_missing_not_as_a_unit_error() {
    let ctx = GameContext { game: Game::new("g1", tip(1), "Away", "Home"), home_team_id: "Home".into(), away_team_id: "Away".into() };
    let markets = HashMap::from([("g1".to_string(), vec![strong_candidate("ghost", "Home")])]);
    let players = HashMap::from([("ghost".to_string(), None)]);
    let team_forms = HashMap::from([
        ("Home".to_string(), team_form("Home", 101.0, 118.0)),
        ("Away".to_string(), team_form("Away", 99.0, 110.0)),
    ]);

    let source = Arc::new(MockSource { markets, players, team_forms, always_fail_markets_for: HashSet::new() });
    let services = Arc::new(Services::new(source, fast_config(false)));

    let output = analyze(RunInput { games: vec![ctx] }, services).await.unwrap();

    assert!(output.errors.is_empty());
    assert!(output.recommendations.is_empty());
    assert_eq!(output.missing_players, vec!["ghost".to_string()]);
}

#[tokio::test]
async fn empty_game_list_is_an_error_only_in_strict_mode() {
    let source = Arc::new(MockSource {
        markets: HashMap::new(),
        players: HashMap::new(),
        team_forms: HashMap::new(),
        always_fail_markets_for: HashSet::new(),
    });

    let lenient = Arc::new(Services::new(source.clone(), fast_config(false)));
    let output = analyze(RunInput { games: vec![] }, lenient).await.unwrap();
    assert!(output.recommendations.is_empty());
    assert!(output.errors.is_empty());

    let strict = Arc::new(Services::new(source, fast_config(true)));
    let err = analyze(RunInput { games: vec![] }, strict).await.unwrap_err();
    assert_eq!(err, PipelineError::EmptyGameListStrictMode);
}

#[tokio::test(start_paused = true)]
async fn output_ordering_is_deterministic_across_runs_and_every_recommendation_validates() {
    let games = vec![
        GameContext { game: Game::new("g1", tip(3), "Away1", "Home1"), home_team_id: "Home1".into(), away_team_id: "Away1".into() },
        GameContext { game: Game::new("g2", tip(1), "Away2", "Home2"), home_team_id: "Home2".into(), away_team_id: "Away2".into() },
        GameContext { game: Game::new("g3", tip(2), "Away3", "Home3"), home_team_id: "Home3".into(), away_team_id: "Away3".into() },
    ];

    let mut markets = HashMap::new();
    let mut players = HashMap::new();
    let mut team_forms = HashMap::new();
    for (game_id, team, opp) in [("g1", "Home1", "Away1"), ("g2", "Home2", "Away2"), ("g3", "Home3", "Away3")] {
        let player_id = format!("p_{game_id}");
        markets.insert(game_id.to_string(), vec![strong_candidate(&player_id, team)]);
        players.insert(player_id.clone(), Some(strong_player_evidence(&player_id, team)));
        team_forms.insert(team.to_string(), team_form(team, 101.0, 118.0));
        team_forms.insert(opp.to_string(), team_form(opp, 99.0, 110.0));
    }

    let make_services = || {
        let source = Arc::new(MockSource { markets: markets.clone(), players: players.clone(), team_forms: team_forms.clone(), always_fail_markets_for: HashSet::new() });
        Arc::new(Services::new(source, fast_config(false)))
    };

    let first = analyze(RunInput { games: games.clone() }, make_services()).await.unwrap();
    let second = analyze(RunInput { games }, make_services()).await.unwrap();

    assert_eq!(first.recommendations.len(), second.recommendations.len());
    assert!(!first.recommendations.is_empty());

    let keys_a: Vec<_> = first.recommendations.iter().map(|r| r.ordering_key()).collect();
    let keys_b: Vec<_> = second.recommendations.iter().map(|r| r.ordering_key()).collect();
    assert_eq!(keys_a, keys_b);
    assert!(keys_a.windows(2).all(|w| w[0] <= w[1]));

    for recommendation in &first.recommendations {
        let result = validate(recommendation);
        assert!(result.ok, "unexpected invariant violations: {:?}", result.violations);
    }
}

#[tokio::test(start_paused = true)]
async fn health_snapshot_is_consistent_with_the_recommendation_list() {
    let ctx = GameContext { game: Game::new("g1", tip(1), "Away", "Home"), home_team_id: "Home".into(), away_team_id: "Away".into() };
    let markets = HashMap::from([("g1".to_string(), vec![strong_candidate("p1", "Home")])]);
    let players = HashMap::from([("p1".to_string(), Some(strong_player_evidence("p1", "Home")))]);
    let team_forms = HashMap::from([
        ("Home".to_string(), team_form("Home", 101.0, 118.0)),
        ("Away".to_string(), team_form("Away", 99.0, 110.0)),
    ]);

    let source = Arc::new(MockSource { markets, players, team_forms, always_fail_markets_for: HashSet::new() });
    let services = Arc::new(Services::new(source, fast_config(false)));

    let output = analyze(RunInput { games: vec![ctx] }, services).await.unwrap();

    assert_eq!(output.health.count, output.recommendations.len());
    assert_eq!(output.health.ev_identity_violations, 0);
    assert_eq!(output.health.sample_floor_violations, 0);
    let total_by_tier: usize = output.health.tier_counts.values().sum();
    assert_eq!(total_by_tier, output.health.count);
    assert!((0.0..=1.0).contains(&output.health.mean_p));

    // HealthSnapshot round-trips through JSON, since it's the artifact callers
    // persist or ship over the wire between runs.
    let json = serde_json::to_string(&output.health).unwrap();
    let reloaded: courtedge_core::HealthSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded, output.health);
}
