//! Quiz session state machine.
//!
//! `QuizMachine` owns the question pool, the grammar points used for tips and
//! the current `QuizState`. Every operation is synchronous; persistence is
//! returned to the caller as a `MasteryUpdate` instead of being performed here.

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::model::{GrammarPoint, GrammarPointId, Mastery, Question, QuestionId};

/// Number of questions drawn for one quiz.
pub const QUIZ_SIZE: usize = 10;

const UNKNOWN_ERROR: &str = "An unknown error occurred";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a quiz cannot be shown. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("No data available")]
    NoData,
    #[error("No questions available")]
    NoQuestions,
    #[error("No grammar points available")]
    NoGrammarPoints,
    #[error("Not enough questions to start a quiz.")]
    NotEnoughQuestions { available: usize },
    #[error("{0}")]
    Upstream(String),
}

impl QuizError {
    /// Wraps a data-source failure, falling back to a generic message.
    #[must_use]
    pub fn upstream(message: &str) -> Self {
        let message = message.trim();
        if message.is_empty() {
            Self::Upstream(UNKNOWN_ERROR.to_owned())
        } else {
            Self::Upstream(message.to_owned())
        }
    }
}

//
// ─── SESSION TYPES ─────────────────────────────────────────────────────────────
//

/// Title and explanation of the grammar point behind the current question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarTip {
    pub title: String,
    pub explanation: String,
}

/// Display and interaction state of the question being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentQuestion {
    question: Question,
    options: Vec<String>,
    selected: Option<String>,
    is_answered: bool,
    is_correct: bool,
    is_hint_shown: bool,
    tip: GrammarTip,
}

impl CurrentQuestion {
    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// The four options in display order.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.is_answered
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn is_hint_shown(&self) -> bool {
        self.is_hint_shown
    }

    #[must_use]
    pub fn tip(&self) -> &GrammarTip {
        &self.tip
    }
}

/// A fixed sample of questions walked through one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    questions: Vec<Question>,
    index: usize,
    correct_answers: usize,
    current: CurrentQuestion,
}

impl QuizSession {
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn correct_answers(&self) -> usize {
        self.correct_answers
    }

    #[must_use]
    pub fn current(&self) -> &CurrentQuestion {
        &self.current
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        QuizProgress {
            index: self.index,
            total: self.questions.len(),
            correct: self.correct_answers,
        }
    }
}

/// Position summary for "question N of M" displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub index: usize,
    pub total: usize,
    pub correct: usize,
}

/// A mastery value the caller should persist for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasteryUpdate {
    pub question_id: QuestionId,
    pub mastery: Mastery,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QuizState {
    #[default]
    Uninitialized,
    Loading,
    Error(QuizError),
    InProgress(QuizSession),
    /// The last question stays visible but no longer reacts to input.
    Finished(QuizSession),
}

/// Coarse status for screens that only care about load/error/success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Error(String),
    Success,
}

impl QuizState {
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        match self {
            QuizState::Uninitialized | QuizState::Loading => LoadStatus::Loading,
            QuizState::Error(err) => LoadStatus::Error(err.to_string()),
            QuizState::InProgress(_) | QuizState::Finished(_) => LoadStatus::Success,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        match self {
            QuizState::InProgress(session) | QuizState::Finished(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub fn correct_answers(&self) -> usize {
        self.session().map_or(0, QuizSession::correct_answers)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, QuizState::Finished(_))
    }

    fn has_started(&self) -> bool {
        matches!(self, QuizState::InProgress(_) | QuizState::Finished(_))
    }
}

//
// ─── MACHINE ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizMachine {
    grammar_points: Vec<GrammarPoint>,
    questions: Vec<Question>,
    state: QuizState,
}

impl Default for QuizMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizMachine {
    /// A machine waiting for its first data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grammar_points: Vec::new(),
            questions: Vec::new(),
            state: QuizState::Loading,
        }
    }

    #[must_use]
    pub fn state(&self) -> &QuizState {
        &self.state
    }

    #[must_use]
    pub fn grammar_points(&self) -> &[GrammarPoint] {
        &self.grammar_points
    }

    /// The full question pool quizzes are drawn from.
    #[must_use]
    pub fn available_questions(&self) -> &[Question] {
        &self.questions
    }

    /// Position in the running or finished quiz, if any.
    #[must_use]
    pub fn progress(&self) -> Option<QuizProgress> {
        self.state.session().map(QuizSession::progress)
    }

    /// Applies the latest grammar points and questions from the store.
    ///
    /// Empty inputs only turn into an error before the first quiz starts.
    /// Non-empty inputs always refresh the pool; the first usable pair starts a
    /// quiz.
    pub fn on_data<R: Rng + ?Sized>(
        &mut self,
        grammar_points: Vec<GrammarPoint>,
        questions: Vec<Question>,
        rng: &mut R,
    ) {
        if grammar_points.is_empty() || questions.is_empty() {
            if !self.state.has_started() {
                let err = match (grammar_points.is_empty(), questions.is_empty()) {
                    (true, true) => QuizError::NoData,
                    (false, true) => QuizError::NoQuestions,
                    _ => QuizError::NoGrammarPoints,
                };
                self.state = QuizState::Error(err);
            }
            return;
        }

        self.grammar_points = grammar_points;
        self.questions = questions;

        if !self.state.has_started() {
            self.start_new_quiz(rng);
        }
    }

    /// Moves to `Error` with the failure's message.
    pub fn on_load_failure(&mut self, message: &str) {
        self.state = QuizState::Error(QuizError::upstream(message));
    }

    /// Draws `QUIZ_SIZE` distinct questions and shows the first one.
    pub fn start_new_quiz<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.questions.len() < QUIZ_SIZE {
            self.state = QuizState::Error(QuizError::NotEnoughQuestions {
                available: self.questions.len(),
            });
            return;
        }

        let mut picked = self.questions.clone();
        picked.shuffle(rng);
        picked.truncate(QUIZ_SIZE);

        let Some(first) = picked.first() else {
            return;
        };
        let current = self.present(first, rng);

        self.state = QuizState::InProgress(QuizSession {
            questions: picked,
            index: 0,
            correct_answers: 0,
            current,
        });
    }

    /// Shows `session[index]` with freshly shuffled options. Out-of-range
    /// indices and sessions that are not in progress are left alone.
    pub fn load_question_at<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) {
        let QuizState::InProgress(session) = &self.state else {
            return;
        };
        let Some(question) = session.questions.get(index) else {
            return;
        };
        let current = self.present(question, rng);

        if let QuizState::InProgress(session) = &mut self.state {
            session.current = current;
            session.index = index;
        }
    }

    /// Advances to the next question, or finishes when already on the last.
    pub fn load_next_question<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let QuizState::InProgress(session) = &self.state else {
            return;
        };
        let next = session.index + 1;

        if next < session.questions.len() {
            self.load_question_at(next, rng);
            return;
        }

        if let QuizState::InProgress(session) = std::mem::take(&mut self.state) {
            self.state = QuizState::Finished(session);
        }
    }

    /// Records an answer for the current question.
    ///
    /// A correct answer bumps the running score and the question's mastery.
    /// The returned update is `Some` only when mastery actually changed.
    pub fn process_answer(&mut self, selected: &str) -> Option<MasteryUpdate> {
        let QuizState::InProgress(session) = &mut self.state else {
            return None;
        };

        let current = &mut session.current;
        let is_correct = current.question.is_correct(selected);
        current.is_answered = true;
        current.is_correct = is_correct;
        current.selected = Some(selected.to_owned());

        if !is_correct {
            return None;
        }
        session.correct_answers += 1;

        let previous = current.question.mastery;
        let next = previous.increment();
        if next <= previous {
            return None;
        }

        current.question.mastery = next;
        let question_id = current.question.id;
        if let Some(in_sequence) = session.questions.get_mut(session.index) {
            in_sequence.mastery = next;
        }

        Some(MasteryUpdate {
            question_id,
            mastery: next,
        })
    }

    pub fn toggle_hint(&mut self) {
        if let QuizState::InProgress(session) = &mut self.state {
            session.current.is_hint_shown = !session.current.is_hint_shown;
        }
    }

    fn present<R: Rng + ?Sized>(&self, question: &Question, rng: &mut R) -> CurrentQuestion {
        let mut options: Vec<String> = question.options().iter().map(|o| (*o).to_owned()).collect();
        options.shuffle(rng);

        CurrentQuestion {
            question: question.clone(),
            options,
            selected: None,
            is_answered: false,
            is_correct: false,
            is_hint_shown: false,
            tip: self.tip_for(question.grammar_point_id),
        }
    }

    fn tip_for(&self, id: GrammarPointId) -> GrammarTip {
        self.grammar_points
            .iter()
            .find(|point| point.id == id)
            .map(|point| GrammarTip {
                title: point.grammar.clone(),
                explanation: point.explanation.clone(),
            })
            .unwrap_or_default()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
