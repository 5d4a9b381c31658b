use async_trait::async_trait;
use bunpo_core::model::{GrammarPoint, GrammarPointId, Mastery, Question, QuestionId};
use bunpo_core::{GrammarPointMasteryRow, MasteryTotals};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::feed::{Feed, Feeds};

/// Errors surfaced by storage adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for grammar points.
#[async_trait]
pub trait GrammarPointRepository: Send + Sync {
    /// Insert grammar points, replacing any with the same id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the grammar points cannot be stored.
    async fn insert_grammar_points(&self, points: &[GrammarPoint]) -> Result<(), StorageError>;

    /// All grammar points, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_grammar_points(&self) -> Result<Vec<GrammarPoint>, StorageError>;

    /// Delete a grammar point together with its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the id is unknown.
    async fn delete_grammar_point(&self, id: GrammarPointId) -> Result<(), StorageError>;

    /// Continuously-updated list of all grammar points.
    fn watch_grammar_points(&self) -> Feed<Vec<GrammarPoint>>;
}

/// Repository contract for questions and their mastery counters.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert questions, replacing any with the same id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a question references an unknown
    /// grammar point, or other storage errors.
    async fn insert_questions(&self, questions: &[Question]) -> Result<(), StorageError>;

    /// All questions, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError>;

    /// Overwrite a single question's mastery.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the id is unknown.
    async fn update_mastery(&self, id: QuestionId, mastery: Mastery) -> Result<(), StorageError>;

    /// Continuously-updated list of all questions.
    fn watch_questions(&self) -> Feed<Vec<Question>>;
}

/// Aggregate mastery queries.
pub trait MasteryRepository: Send + Sync {
    /// Sum of all mastery counters and the number of questions.
    fn watch_total_mastery(&self) -> Feed<MasteryTotals>;

    /// One row per grammar point that owns at least one question.
    fn watch_mastery_by_grammar_point(&self) -> Feed<Vec<GrammarPointMasteryRow>>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default)]
struct Tables {
    grammar_points: Vec<GrammarPoint>,
    questions: Vec<Question>,
}

impl Tables {
    fn totals(&self) -> MasteryTotals {
        let count = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let sum = (!self.questions.is_empty())
            .then(|| self.questions.iter().map(|q| q.mastery.value()).sum());
        MasteryTotals { sum, count }
    }

    fn by_grammar_point(&self) -> Vec<GrammarPointMasteryRow> {
        let mut grouped: BTreeMap<GrammarPointId, (u32, u32)> = BTreeMap::new();
        for question in &self.questions {
            let entry = grouped.entry(question.grammar_point_id).or_default();
            entry.0 += question.mastery.value();
            entry.1 += 1;
        }
        grouped
            .into_iter()
            .map(|(grammar_point_id, (sum, count))| GrammarPointMasteryRow {
                grammar_point_id,
                sum: Some(sum),
                count,
            })
            .collect()
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
    feeds: Arc<Feeds>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn publish_grammar_points(&self, tables: &Tables) {
        self.feeds
            .publish_grammar_points(Ok(tables.grammar_points.clone()));
    }

    fn publish_questions(&self, tables: &Tables) {
        self.feeds.publish_questions(Ok(tables.questions.clone()));
        self.feeds.publish_totals(Ok(tables.totals()));
        self.feeds
            .publish_by_grammar_point(Ok(tables.by_grammar_point()));
    }
}

#[async_trait]
impl GrammarPointRepository for InMemoryRepository {
    async fn insert_grammar_points(&self, points: &[GrammarPoint]) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        for point in points {
            match tables.grammar_points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point.clone(),
                None => tables.grammar_points.push(point.clone()),
            }
        }
        tables.grammar_points.sort_by_key(|p| p.id);
        self.publish_grammar_points(&tables);
        Ok(())
    }

    async fn list_grammar_points(&self) -> Result<Vec<GrammarPoint>, StorageError> {
        Ok(self.lock()?.grammar_points.clone())
    }

    async fn delete_grammar_point(&self, id: GrammarPointId) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        let before = tables.grammar_points.len();
        tables.grammar_points.retain(|p| p.id != id);
        if tables.grammar_points.len() == before {
            return Err(StorageError::NotFound);
        }
        tables.questions.retain(|q| q.grammar_point_id != id);
        self.publish_grammar_points(&tables);
        self.publish_questions(&tables);
        Ok(())
    }

    fn watch_grammar_points(&self) -> Feed<Vec<GrammarPoint>> {
        self.feeds.grammar_points()
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        let orphan = questions.iter().any(|q| {
            !tables
                .grammar_points
                .iter()
                .any(|p| p.id == q.grammar_point_id)
        });
        if orphan {
            return Err(StorageError::Conflict);
        }

        for question in questions {
            match tables.questions.iter_mut().find(|q| q.id == question.id) {
                Some(existing) => *existing = question.clone(),
                None => tables.questions.push(question.clone()),
            }
        }
        tables.questions.sort_by_key(|q| q.id);
        self.publish_questions(&tables);
        Ok(())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        Ok(self.lock()?.questions.clone())
    }

    async fn update_mastery(&self, id: QuestionId, mastery: Mastery) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        let question = tables
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(StorageError::NotFound)?;
        question.mastery = mastery;
        self.publish_questions(&tables);
        Ok(())
    }

    fn watch_questions(&self) -> Feed<Vec<Question>> {
        self.feeds.questions()
    }
}

impl MasteryRepository for InMemoryRepository {
    fn watch_total_mastery(&self) -> Feed<MasteryTotals> {
        self.feeds.totals()
    }

    fn watch_mastery_by_grammar_point(&self) -> Feed<Vec<GrammarPointMasteryRow>> {
        self.feeds.by_grammar_point()
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub grammar_points: Arc<dyn GrammarPointRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub mastery: Arc<dyn MasteryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let grammar_points: Arc<dyn GrammarPointRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let mastery: Arc<dyn MasteryRepository> = Arc::new(repo);
        Self {
            grammar_points,
            questions,
            mastery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bunpo_core::model::JlptLevel;

    fn point(id: u64) -> GrammarPoint {
        GrammarPoint::new(
            GrammarPointId::new(id),
            format!("G{id}"),
            Some(JlptLevel::N5),
            "m",
            "e",
        )
    }

    fn question(id: u64, grammar_point: u64, mastery: u32) -> Question {
        Question {
            id: QuestionId::new(id),
            grammar_point_id: GrammarPointId::new(grammar_point),
            prompt: format!("Q{id}"),
            correct_option: "a".into(),
            incorrect_options: ["b".into(), "c".into(), "d".into()],
            answer: String::new(),
            translation: String::new(),
            mastery: Mastery::new(mastery).unwrap(),
        }
    }

    #[tokio::test]
    async fn aggregates_follow_writes() {
        let repo = InMemoryRepository::new();
        let totals = repo.watch_total_mastery();
        assert_eq!(*totals.borrow(), Ok(MasteryTotals { sum: None, count: 0 }));

        repo.insert_grammar_points(&[point(1), point(2)]).await.unwrap();
        repo.insert_questions(&[question(1, 1, 3), question(2, 1, 4), question(3, 2, 5)])
            .await
            .unwrap();

        assert_eq!(
            *totals.borrow(),
            Ok(MasteryTotals {
                sum: Some(12),
                count: 3
            })
        );
        let rows = repo.watch_mastery_by_grammar_point().borrow().clone().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].sum, rows[0].count), (Some(7), 2));
        assert_eq!((rows[1].sum, rows[1].count), (Some(5), 1));

        repo.update_mastery(QuestionId::new(1), Mastery::MAX)
            .await
            .unwrap();
        assert_eq!(totals.borrow().as_ref().unwrap().sum, Some(14));
    }

    #[tokio::test]
    async fn insert_replaces_by_id_and_lists_in_id_order() {
        let repo = InMemoryRepository::new();
        repo.insert_grammar_points(&[point(3), point(1), point(2)])
            .await
            .unwrap();
        let mut renamed = point(3);
        renamed.grammar = "renamed".into();
        repo.insert_grammar_points(&[renamed]).await.unwrap();

        let points = repo.list_grammar_points().await.unwrap();
        let ids: Vec<_> = points.iter().map(|p| p.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(points[2].grammar, "renamed");

        repo.insert_questions(&[question(9, 1, 0), question(4, 2, 0)])
            .await
            .unwrap();
        let questions = repo.list_questions().await.unwrap();
        assert_eq!(questions[0].id, QuestionId::new(4));
    }

    #[tokio::test]
    async fn questions_require_an_existing_grammar_point() {
        let repo = InMemoryRepository::new();
        let err = repo.insert_questions(&[question(1, 9, 0)]).await.unwrap_err();
        assert_eq!(err, StorageError::Conflict);
    }

    #[tokio::test]
    async fn deleting_grammar_point_cascades() {
        let repo = InMemoryRepository::new();
        repo.insert_grammar_points(&[point(1), point(2)]).await.unwrap();
        repo.insert_questions(&[question(1, 1, 1), question(2, 2, 2)])
            .await
            .unwrap();

        repo.delete_grammar_point(GrammarPointId::new(1)).await.unwrap();

        let questions = repo.list_questions().await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, QuestionId::new(2));
        assert_eq!(
            repo.delete_grammar_point(GrammarPointId::new(1)).await,
            Err(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn update_unknown_question_is_not_found() {
        let repo = InMemoryRepository::new();
        assert_eq!(
            repo.update_mastery(QuestionId::new(1), Mastery::ZERO).await,
            Err(StorageError::NotFound)
        );
    }
}
