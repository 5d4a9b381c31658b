use std::sync::Arc;

use bunpo_core::model::{GrammarPoint, Question};
use bunpo_core::{MasteryUpdate, QuizMachine};
use storage::feed::Observed;
use storage::repository::{GrammarPointRepository, QuestionRepository};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::feed::CombineLatest;

/// Drives one quiz screen.
///
/// All state lives in a single `watch` channel and every command mutates it
/// through `send_modify`, so observers never see a half-applied update.
/// Loading follows the grammar point and question feeds for as long as the
/// service is alive.
pub struct QuizService {
    state: Arc<watch::Sender<QuizMachine>>,
    questions: Arc<dyn QuestionRepository>,
    runtime: Handle,
    writes: TaskTracker,
    loader: JoinHandle<()>,
}

impl QuizService {
    /// Starts following the repositories' feeds.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn start(
        grammar_points: &dyn GrammarPointRepository,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        let state = Arc::new(watch::Sender::new(QuizMachine::new()));
        let feeds = CombineLatest::new(
            grammar_points.watch_grammar_points(),
            questions.watch_questions(),
        );
        let runtime = Handle::current();
        let loader = runtime.spawn(follow(Arc::clone(&state), feeds));

        Self {
            state,
            questions,
            runtime,
            writes: TaskTracker::new(),
            loader,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QuizMachine> {
        self.state.subscribe()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> QuizMachine {
        self.state.borrow().clone()
    }

    pub fn start_new_quiz(&self) {
        self.state.send_modify(|machine| {
            machine.start_new_quiz(&mut rand::rng());
        });
    }

    pub fn load_next_question(&self) {
        self.state.send_modify(|machine| {
            machine.load_next_question(&mut rand::rng());
        });
    }

    pub fn on_hint_toggled(&self) {
        self.state.send_modify(QuizMachine::toggle_hint);
    }

    /// Scores `option` against the current question.
    ///
    /// A mastery increase is visible immediately; the write to the store runs
    /// in the background and its outcome is not reflected in the state.
    pub fn process_answer(&self, option: &str) {
        let mut update = None;
        self.state.send_modify(|machine| {
            update = machine.process_answer(option);
        });

        if let Some(update) = update {
            self.persist(update);
        }
    }

    /// Waits for every mastery write spawned so far.
    pub async fn flush_pending_writes(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    fn persist(&self, update: MasteryUpdate) {
        let questions = Arc::clone(&self.questions);
        self.writes.spawn_on(
            async move {
                // TODO: retry or surface failed writes once the UI has a place to show them.
                if let Err(err) = questions
                    .update_mastery(update.question_id, update.mastery)
                    .await
                {
                    warn!(
                        question_id = %update.question_id,
                        mastery = update.mastery.value(),
                        error = %err,
                        "mastery update was not persisted"
                    );
                }
            },
            &self.runtime,
        );
    }
}

impl Drop for QuizService {
    fn drop(&mut self) {
        self.loader.abort();
    }
}

async fn follow(
    state: Arc<watch::Sender<QuizMachine>>,
    mut feeds: CombineLatest<Observed<Vec<GrammarPoint>>, Observed<Vec<Question>>>,
) {
    let (grammar_points, questions) = feeds.current();
    if !apply(&state, grammar_points, questions) {
        return;
    }

    while let Some((grammar_points, questions)) = feeds.next().await {
        if !apply(&state, grammar_points, questions) {
            return;
        }
    }
    debug!("quiz feeds closed");
}

/// Feeds one pair into the machine. Returns `false` once loading has failed.
fn apply(
    state: &watch::Sender<QuizMachine>,
    grammar_points: Observed<Vec<GrammarPoint>>,
    questions: Observed<Vec<Question>>,
) -> bool {
    match (grammar_points, questions) {
        (Ok(grammar_points), Ok(questions)) => {
            debug!(
                grammar_points = grammar_points.len(),
                questions = questions.len(),
                "quiz data updated"
            );
            state.send_modify(|machine| {
                machine.on_data(grammar_points, questions, &mut rand::rng());
            });
            true
        }
        (Err(err), _) | (_, Err(err)) => {
            warn!(error = %err, "quiz data failed to load");
            state.send_modify(|machine| machine.on_load_failure(&err.to_string()));
            false
        }
    }
}
