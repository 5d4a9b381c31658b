//! First-launch dataset loading.

use bunpo_core::model::{GrammarPoint, GrammarPointId, JlptLevel, Mastery, Question, QuestionId};
use serde::Deserialize;
use storage::repository::{GrammarPointRepository, QuestionRepository};
use tracing::{debug, info};

use crate::error::SeedError;

const BUNDLED_GRAMMAR: &str = include_str!("../data/grammar.json");
const BUNDLED_QUESTIONS: &str = include_str!("../data/questions.json");

#[derive(Debug, Deserialize)]
struct GrammarPointRecord {
    id: u64,
    grammar: String,
    #[serde(default)]
    jlpt: Option<String>,
    meaning: String,
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct QuestionRecord {
    grammar_point_id: u64,
    japanese_question: String,
    correct_option: String,
    #[serde(rename = "Incorrect_option_one")]
    incorrect_option_one: String,
    #[serde(rename = "Incorrect_option_two")]
    incorrect_option_two: String,
    #[serde(rename = "Incorrect_option_three")]
    incorrect_option_three: String,
    japanese_answer: String,
    english_translation: String,
}

/// Grammar points and questions parsed from the seed JSON files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedDataset {
    grammar_points: Vec<GrammarPoint>,
    questions: Vec<Question>,
}

impl SeedDataset {
    /// The N5 dataset compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `SeedError` if the bundled files fail to parse.
    pub fn bundled() -> Result<Self, SeedError> {
        Self::from_json(BUNDLED_GRAMMAR, BUNDLED_QUESTIONS)
    }

    /// Parses the two seed files.
    ///
    /// The legacy per-point `mastery` field is ignored. Questions get
    /// sequential ids starting at 1, in file order, with zero mastery. A blank
    /// `jlpt` is treated as unknown.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Json` for malformed JSON and `SeedError::Level` for
    /// a JLPT level that is not N1 through N5.
    pub fn from_json(grammar: &str, questions: &str) -> Result<Self, SeedError> {
        let grammar: Vec<GrammarPointRecord> = serde_json::from_str(grammar)?;
        let questions: Vec<QuestionRecord> = serde_json::from_str(questions)?;

        let grammar_points = grammar
            .into_iter()
            .map(|record| {
                let id = GrammarPointId::new(record.id);
                let level = match record.jlpt.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(raw) => Some(
                        raw.parse::<JlptLevel>()
                            .map_err(|source| SeedError::Level { id, source })?,
                    ),
                };
                Ok(GrammarPoint::new(
                    id,
                    record.grammar,
                    level,
                    record.meaning,
                    record.explanation,
                ))
            })
            .collect::<Result<Vec<_>, SeedError>>()?;

        let questions = questions
            .into_iter()
            .zip(1_u64..)
            .map(|(record, id)| Question {
                id: QuestionId::new(id),
                grammar_point_id: GrammarPointId::new(record.grammar_point_id),
                prompt: record.japanese_question,
                correct_option: record.correct_option,
                incorrect_options: [
                    record.incorrect_option_one,
                    record.incorrect_option_two,
                    record.incorrect_option_three,
                ],
                answer: record.japanese_answer,
                translation: record.english_translation,
                mastery: Mastery::ZERO,
            })
            .collect();

        Ok(Self {
            grammar_points,
            questions,
        })
    }

    #[must_use]
    pub fn grammar_points(&self) -> &[GrammarPoint] {
        &self.grammar_points
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

/// How many rows `seed_if_empty` wrote to each table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub grammar_points: usize,
    pub questions: usize,
}

/// Loads the dataset into each table that is still empty.
///
/// Grammar points go first so questions never reference a missing point.
///
/// # Errors
///
/// Returns `SeedError::Storage` if a read or insert fails.
pub async fn seed_if_empty(
    grammar_points: &dyn GrammarPointRepository,
    questions: &dyn QuestionRepository,
    dataset: &SeedDataset,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    if grammar_points.list_grammar_points().await?.is_empty() {
        grammar_points
            .insert_grammar_points(dataset.grammar_points())
            .await?;
        report.grammar_points = dataset.grammar_points().len();
    } else {
        debug!("grammar points already present, skipping seed");
    }

    if questions.list_questions().await?.is_empty() {
        questions.insert_questions(dataset.questions()).await?;
        report.questions = dataset.questions().len();
    } else {
        debug!("questions already present, skipping seed");
    }

    if report != SeedReport::default() {
        info!(
            grammar_points = report.grammar_points,
            questions = report.questions,
            "seeded dataset"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bunpo_core::QUIZ_SIZE;
    use storage::repository::InMemoryRepository;

    #[test]
    fn bundled_dataset_supports_a_full_quiz() {
        let dataset = SeedDataset::bundled().unwrap();
        assert!(dataset.questions().len() >= QUIZ_SIZE);
        assert!(!dataset.grammar_points().is_empty());

        for question in dataset.questions() {
            assert!(
                dataset
                    .grammar_points()
                    .iter()
                    .any(|point| point.id == question.grammar_point_id),
                "question {} has no grammar point",
                question.id
            );
            assert!(
                !question
                    .incorrect_options
                    .contains(&question.correct_option),
                "question {} repeats its answer",
                question.id
            );
        }
    }

    #[test]
    fn parses_dataset_field_names_and_assigns_ids() {
        let grammar = r#"[
            {"id": 3, "grammar": "〜から", "jlpt": "n5", "meaning": "because", "explanation": "e", "mastery": 2},
            {"id": 4, "grammar": "〜まで", "jlpt": "", "meaning": "until", "explanation": "e"}
        ]"#;
        let questions = r#"[
            {"grammar_point_id": 3, "japanese_question": "q1", "correct_option": "a",
             "Incorrect_option_one": "b", "Incorrect_option_two": "c", "Incorrect_option_three": "d",
             "japanese_answer": "ans", "english_translation": "t"},
            {"grammar_point_id": 4, "japanese_question": "q2", "correct_option": "a",
             "Incorrect_option_one": "b", "Incorrect_option_two": "c", "Incorrect_option_three": "d",
             "japanese_answer": "ans", "english_translation": "t"}
        ]"#;

        let dataset = SeedDataset::from_json(grammar, questions).unwrap();

        assert_eq!(dataset.grammar_points()[0].level, Some(JlptLevel::N5));
        assert_eq!(dataset.grammar_points()[1].level, None);
        let ids: Vec<_> = dataset.questions().iter().map(|q| q.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(dataset.questions()[1].incorrect_options[2], "d");
        assert!(dataset.questions().iter().all(|q| q.mastery == Mastery::ZERO));
    }

    #[test]
    fn rejects_unknown_levels() {
        let grammar = r#"[{"id": 9, "grammar": "g", "jlpt": "N7", "meaning": "m", "explanation": "e"}]"#;
        let err = SeedDataset::from_json(grammar, "[]").unwrap_err();
        assert!(matches!(err, SeedError::Level { id, .. } if id == GrammarPointId::new(9)));
    }

    #[tokio::test]
    async fn seeding_only_fills_empty_tables() {
        let repo = InMemoryRepository::new();
        let dataset = SeedDataset::bundled().unwrap();

        let first = seed_if_empty(&repo, &repo, &dataset).await.unwrap();
        assert_eq!(first.questions, dataset.questions().len());

        repo.update_mastery(QuestionId::new(1), Mastery::MAX)
            .await
            .unwrap();
        let second = seed_if_empty(&repo, &repo, &dataset).await.unwrap();

        assert_eq!(second, SeedReport::default());
        let stored = repo.list_questions().await.unwrap();
        assert_eq!(stored.len(), dataset.questions().len());
        assert_eq!(stored[0].mastery, Mastery::MAX);
    }
}
