//! Bounded-concurrency fan-out over games — C4 (§4.4). Generic over the
//! per-unit work so C5-C9 can be composed in by the pipeline driver without
//! this module knowing their types. Grounded on the teacher's
//! semaphore-gated worker pool in `signals/enrichment.rs::spawn_workers`
//! and the `FuturesUnordered` fan-out in
//! `signals/wallet_analytics.rs::build_equity_curves_concurrent` —
//! reimplemented over `tokio::task::JoinSet` since `futures-util` has no
//! other use in this crate (see DESIGN.md).

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::domain::Game;
use crate::error::UnitError;

/// The result of running one game's unit of work: either its produced
/// value, or a `UnitError` recorded for partial-failure aggregation
/// (§4.4: "a failed game unit yields an entry with tier = D... The
/// orchestrator never fails the whole run because of one unit.").
pub struct UnitOutcome<T> {
    pub game: Game,
    pub result: Result<T, UnitError>,
}

/// Cooperative cancellation handle: checked between unit dispatches only.
/// A run is not cancelable mid-unit (§4.4); setting this merely stops new
/// units from being spawned, it never aborts an in-flight one.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs `unit` once per game with up to `config.max_concurrent_units`
/// running concurrently (§4.4). Between dispatches, sleeps a duration
/// sampled uniformly from `[inter_unit_delay_min, inter_unit_delay_max]`
/// to spread load beyond what the per-upstream token buckets already
/// smooth. Output is returned in the same order as `games` — the caller
/// reorders into the final deterministic ranking (§4.4) on top of this.
pub async fn run_units<T, F, Fut>(
    games: Vec<Game>,
    config: &PipelineConfig,
    cancel: CancelToken,
    unit: F,
) -> Vec<UnitOutcome<T>>
where
    F: Fn(Game) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, UnitError>> + Send + 'static,
    T: Send + 'static,
{
    let unit = Arc::new(unit);
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_units.max(1)));
    let mut rng = rand::thread_rng();
    let mut joins: JoinSet<(usize, UnitOutcome<T>)> = JoinSet::new();

    for (index, game) in games.iter().cloned().enumerate() {
        if cancel.is_cancelled() {
            warn!(remaining = games.len() - index, "orchestrator cancelled between units");
            break;
        }

        let sem = semaphore.clone();
        let unit = unit.clone();
        let game_for_task = game.clone();
        joins.spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore never closed");
            // A panic inside `unit` must become a UnitError tied to this game
            // (§5), never an unaccounted-for JoinError that would drop the
            // game from the run's output entirely.
            let result = match AssertUnwindSafe(unit(game_for_task.clone())).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let reason = panic_message(&panic);
                    warn!(game_id = %game_for_task.game_id, reason = %reason, "game unit task panicked");
                    Err(UnitError { game_id: game_for_task.game_id.clone(), reason: format!("panicked: {reason}") })
                }
            };
            (index, UnitOutcome { game: game_for_task, result })
        });

        if index + 1 < games.len() {
            let delay = sample_inter_unit_delay(config, &mut rng);
            tokio::time::sleep(delay).await;
        }
    }

    let mut slots: Vec<Option<UnitOutcome<T>>> = (0..games.len()).map(|_| None).collect();
    while let Some(joined) = joins.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(join_err) => warn!(%join_err, "game unit task was aborted or lost before it could report"),
        }
    }

    slots.into_iter().flatten().collect()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

fn sample_inter_unit_delay(config: &PipelineConfig, rng: &mut impl Rng) -> std::time::Duration {
    let min_ms = config.inter_unit_delay_min.as_millis() as u64;
    let max_ms = config.inter_unit_delay_max.as_millis() as u64;
    if max_ms <= min_ms {
        return config.inter_unit_delay_min;
    }
    std::time::Duration::from_millis(rng.gen_range(min_ms..max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn game(id: &str) -> Game {
        Game::new(id, Utc::now(), "Away", "Home")
    }

    #[tokio::test(start_paused = true)]
    async fn preserves_input_order_regardless_of_completion_order() {
        let games = vec![game("a"), game("b"), game("c")];
        let mut config = PipelineConfig::default();
        config.inter_unit_delay_min = Duration::ZERO;
        config.inter_unit_delay_max = Duration::ZERO;

        let outcomes = run_units(games, &config, CancelToken::new(), |g| async move {
            // reverse-order completion: "a" sleeps longest.
            let delay = match g.game_id.as_str() {
                "a" => Duration::from_millis(30),
                "b" => Duration::from_millis(10),
                _ => Duration::from_millis(0),
            };
            tokio::time::sleep(delay).await;
            Ok::<_, UnitError>(g.game_id.clone())
        })
        .await;

        let ids: Vec<String> = outcomes.into_iter().map(|o| o.result.unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn isolates_a_failed_unit() {
        let games = vec![game("a"), game("b")];
        let config = PipelineConfig::default();

        let outcomes = run_units(games, &config, CancelToken::new(), |g| async move {
            if g.game_id == "a" {
                Err(UnitError { game_id: g.game_id.clone(), reason: "boom".into() })
            } else {
                Ok(1)
            }
        })
        .await;

        assert!(outcomes[0].result.is_err());
        assert_eq!(outcomes[1].result, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn respects_concurrency_bound() {
        let games: Vec<Game> = (0..6).map(|i| game(&i.to_string())).collect();
        let mut config = PipelineConfig::default();
        config.max_concurrent_units = 2;
        config.inter_unit_delay_min = Duration::ZERO;
        config.inter_unit_delay_max = Duration::ZERO;

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let in_flight_for_unit = in_flight.clone();
        let max_observed_for_unit = max_observed.clone();

        run_units(games, &config, CancelToken::new(), move |_g| {
            let in_flight = in_flight_for_unit.clone();
            let max_observed = max_observed_for_unit.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_observed.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, UnitError>(())
            }
        })
        .await;

        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_new_units_without_aborting_inflight() {
        let games = vec![game("a"), game("b"), game("c")];
        let mut config = PipelineConfig::default();
        config.max_concurrent_units = 1;
        config.inter_unit_delay_min = Duration::from_millis(5);
        config.inter_unit_delay_max = Duration::from_millis(5);
        let cancel = CancelToken::new();
        let cancel_for_unit = cancel.clone();

        let outcomes = run_units(games, &config, cancel, move |g| {
            let cancel = cancel_for_unit.clone();
            async move {
                if g.game_id == "a" {
                    cancel.cancel();
                }
                Ok::<_, UnitError>(g.game_id.clone())
            }
        })
        .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].result.as_deref(), Ok("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn a_panicking_unit_is_recorded_as_a_unit_error_not_dropped() {
        let games = vec![game("a"), game("b")];
        let config = PipelineConfig::default();

        let outcomes = run_units(games, &config, CancelToken::new(), |g| async move {
            if g.game_id == "a" {
                panic!("boom");
            }
            Ok::<_, UnitError>(g.game_id.clone())
        })
        .await;

        assert_eq!(outcomes.len(), 2, "the panicking game must still appear in the output");
        assert_eq!(outcomes[0].game.game_id, "a");
        assert!(outcomes[0].result.is_err());
        assert_eq!(outcomes[0].result.as_ref().unwrap_err().game_id, "a");
        assert_eq!(outcomes[1].result.as_deref(), Ok("b"));
    }
}
