//! Continuously-updated query results.
//!
//! Each observable query is a `tokio::sync::watch` channel holding the latest
//! result. Stores re-publish a feed after every write that touches its table.

use bunpo_core::model::{GrammarPoint, Question};
use bunpo_core::{GrammarPointMasteryRow, MasteryTotals};
use tokio::sync::watch;

use crate::repository::StorageError;

/// Latest result of an observable query; failures travel through the feed.
pub type Observed<T> = Result<T, StorageError>;

/// Receiving end of an observable query.
pub type Feed<T> = watch::Receiver<Observed<T>>;

/// Publishing side of every observable query a store exposes.
#[derive(Debug)]
pub(crate) struct Feeds {
    grammar_points: watch::Sender<Observed<Vec<GrammarPoint>>>,
    questions: watch::Sender<Observed<Vec<Question>>>,
    totals: watch::Sender<Observed<MasteryTotals>>,
    by_grammar_point: watch::Sender<Observed<Vec<GrammarPointMasteryRow>>>,
}

impl Default for Feeds {
    fn default() -> Self {
        Self {
            grammar_points: watch::Sender::new(Ok(Vec::new())),
            questions: watch::Sender::new(Ok(Vec::new())),
            totals: watch::Sender::new(Ok(MasteryTotals::default())),
            by_grammar_point: watch::Sender::new(Ok(Vec::new())),
        }
    }
}

impl Feeds {
    // `send_replace` stores the value even while nobody is subscribed.
    pub(crate) fn publish_grammar_points(&self, value: Observed<Vec<GrammarPoint>>) {
        self.grammar_points.send_replace(value);
    }

    pub(crate) fn publish_questions(&self, value: Observed<Vec<Question>>) {
        self.questions.send_replace(value);
    }

    pub(crate) fn publish_totals(&self, value: Observed<MasteryTotals>) {
        self.totals.send_replace(value);
    }

    pub(crate) fn publish_by_grammar_point(&self, value: Observed<Vec<GrammarPointMasteryRow>>) {
        self.by_grammar_point.send_replace(value);
    }

    pub(crate) fn grammar_points(&self) -> Feed<Vec<GrammarPoint>> {
        self.grammar_points.subscribe()
    }

    pub(crate) fn questions(&self) -> Feed<Vec<Question>> {
        self.questions.subscribe()
    }

    pub(crate) fn totals(&self) -> Feed<MasteryTotals> {
        self.totals.subscribe()
    }

    pub(crate) fn by_grammar_point(&self) -> Feed<Vec<GrammarPointMasteryRow>> {
        self.by_grammar_point.subscribe()
    }
}
