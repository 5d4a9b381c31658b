use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bunpo_core::{
    GrammarPointWithMastery, MasteryTotals, TotalMastery, compute_grammar_points_with_mastery,
    compute_total_mastery,
};
use storage::feed::Observed;
use storage::repository::{GrammarPointRepository, MasteryRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::feed::{CombineLatest, combine_latest};

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// What the achievements screen renders.
#[derive(Debug, Clone, PartialEq)]
pub enum AchievementsUiState {
    Loading,
    Success {
        total: TotalMastery,
        grammar_points: Vec<GrammarPointWithMastery>,
    },
    Error(String),
}

/// Publishes overall and per-grammar-point mastery while someone is watching.
///
/// The upstream subscription starts with the first observer and is torn down
/// once no observer has been attached for the grace period. A later
/// `subscribe` starts it again, keeping the last published state meanwhile.
pub struct AchievementsService {
    grammar_points: Arc<dyn GrammarPointRepository>,
    mastery: Arc<dyn MasteryRepository>,
    state: Arc<watch::Sender<AchievementsUiState>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    grace_period: Duration,
}

/// Shared between `subscribe` and the driver task. A driver only stops while
/// holding the lock, so an observer attached under the lock is never orphaned.
#[derive(Default)]
struct Lifecycle {
    running: bool,
    /// Bumped on every `subscribe`.
    attaches: u64,
    handle: Option<JoinHandle<()>>,
}

fn lock(lifecycle: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    match lifecycle.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl AchievementsService {
    #[must_use]
    pub fn new(
        grammar_points: Arc<dyn GrammarPointRepository>,
        mastery: Arc<dyn MasteryRepository>,
    ) -> Self {
        Self {
            grammar_points,
            mastery,
            state: Arc::new(watch::Sender::new(AchievementsUiState::Loading)),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Attach an observer, starting the upstream subscription if needed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe(&self) -> watch::Receiver<AchievementsUiState> {
        let mut lifecycle = lock(&self.lifecycle);
        let rx = self.state.subscribe();
        lifecycle.attaches += 1;

        if !lifecycle.running {
            debug!("starting achievements subscription");
            lifecycle.running = true;
            lifecycle.handle = Some(tokio::spawn(drive(
                Driver {
                    state: Arc::clone(&self.state),
                    lifecycle: Arc::clone(&self.lifecycle),
                    grace_period: self.grace_period,
                },
                self.grammar_points.watch_grammar_points(),
                Arc::clone(&self.mastery),
            )));
        }

        rx
    }

    /// Whether the upstream subscription is currently alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        lock(&self.lifecycle).running
    }
}

impl Drop for AchievementsService {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.lifecycle).handle.take() {
            handle.abort();
        }
    }
}

type PerGrammarPoint = Observed<Vec<GrammarPointWithMastery>>;

struct Driver {
    state: Arc<watch::Sender<AchievementsUiState>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    grace_period: Duration,
}

impl Driver {
    fn attaches(&self) -> u64 {
        lock(&self.lifecycle).attaches
    }

    /// Stops if nobody is watching and nobody attached since `seen`.
    fn try_stop(&self, seen: u64) -> bool {
        let mut lifecycle = lock(&self.lifecycle);
        if self.state.receiver_count() > 0 || lifecycle.attaches != seen {
            return false;
        }
        lifecycle.running = false;
        true
    }

    fn finish(&self) {
        lock(&self.lifecycle).running = false;
    }
}

async fn drive(
    driver: Driver,
    grammar_points: storage::Feed<Vec<bunpo_core::model::GrammarPoint>>,
    mastery: Arc<dyn MasteryRepository>,
) {
    let per_point = combine_latest(
        grammar_points,
        mastery.watch_mastery_by_grammar_point(),
        |points, rows| match (points, rows) {
            (Ok(points), Ok(rows)) => Ok(compute_grammar_points_with_mastery(points, rows)),
            (Err(err), _) | (_, Err(err)) => Err(err.clone()),
        },
    );
    let mut combined = CombineLatest::new(mastery.watch_total_mastery(), per_point);

    let (totals, points) = combined.current();
    if !publish(&driver.state, totals, points) {
        driver.finish();
        return;
    }

    // Start of the current unobserved window and the attach count seen then.
    let mut unobserved: Option<(Instant, u64)> = None;
    loop {
        let deadline =
            unobserved.map_or_else(Instant::now, |(since, _)| since + driver.grace_period);
        tokio::select! {
            () = driver.state.closed(), if unobserved.is_none() => {
                unobserved = Some((Instant::now(), driver.attaches()));
            }
            () = tokio::time::sleep_until(deadline), if unobserved.is_some() => {
                let seen = unobserved.take().map_or(0, |(_, seen)| seen);
                if driver.try_stop(seen) {
                    debug!("no achievements observers left, stopping subscription");
                    return;
                }
                if driver.state.receiver_count() == 0 {
                    // Someone came and went during the window; wait a full one again.
                    unobserved = Some((Instant::now(), driver.attaches()));
                }
            }
            next = combined.next() => {
                let Some((totals, points)) = next else {
                    driver.finish();
                    return;
                };
                if !publish(&driver.state, totals, points) {
                    driver.finish();
                    return;
                }
            }
        }
    }
}

/// Returns `false` after publishing an error; the subscription ends there.
fn publish(
    state: &watch::Sender<AchievementsUiState>,
    totals: Observed<MasteryTotals>,
    points: PerGrammarPoint,
) -> bool {
    match (totals, points) {
        (Ok(totals), Ok(grammar_points)) => {
            state.send_replace(AchievementsUiState::Success {
                total: compute_total_mastery(totals.sum, totals.count),
                grammar_points,
            });
            true
        }
        (Err(err), _) | (_, Err(err)) => {
            warn!(error = %err, "achievements failed to load");
            let message = err.to_string();
            let message = if message.trim().is_empty() {
                "An unknown error occurred".to_owned()
            } else {
                message
            };
            state.send_replace(AchievementsUiState::Error(message));
            false
        }
    }
}
