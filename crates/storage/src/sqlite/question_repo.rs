use bunpo_core::model::{Mastery, Question, QuestionId};

use super::mapping::{grammar_point_id_to_i64, map_question_row, question_id_to_i64};
use super::SqliteRepository;
use crate::feed::Feed;
use crate::repository::{QuestionRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::Conflict,
        other => StorageError::Connection(other.to_string()),
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        for question in questions {
            let [one, two, three] = &question.incorrect_options;
            sqlx::query(
                r"
                INSERT INTO questions (
                    id, grammar_point_id, japanese_question, correct_option,
                    incorrect_option_one, incorrect_option_two, incorrect_option_three,
                    japanese_answer, english_translation, mastery_level
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    grammar_point_id = excluded.grammar_point_id,
                    japanese_question = excluded.japanese_question,
                    correct_option = excluded.correct_option,
                    incorrect_option_one = excluded.incorrect_option_one,
                    incorrect_option_two = excluded.incorrect_option_two,
                    incorrect_option_three = excluded.incorrect_option_three,
                    japanese_answer = excluded.japanese_answer,
                    english_translation = excluded.english_translation,
                    mastery_level = excluded.mastery_level
                ",
            )
            .bind(question_id_to_i64(question.id)?)
            .bind(grammar_point_id_to_i64(question.grammar_point_id)?)
            .bind(question.prompt.clone())
            .bind(question.correct_option.clone())
            .bind(one.clone())
            .bind(two.clone())
            .bind(three.clone())
            .bind(question.answer.clone())
            .bind(question.translation.clone())
            .bind(i64::from(question.mastery.value()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        self.refresh_questions().await;
        Ok(())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        self.query_questions().await
    }

    async fn update_mastery(&self, id: QuestionId, mastery: Mastery) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE questions SET mastery_level = ?1 WHERE id = ?2")
            .bind(i64::from(mastery.value()))
            .bind(question_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        self.refresh_questions().await;
        Ok(())
    }

    fn watch_questions(&self) -> Feed<Vec<Question>> {
        self.feeds.questions()
    }
}

impl SqliteRepository {
    pub(super) async fn query_questions(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, grammar_point_id, japanese_question, correct_option,
                incorrect_option_one, incorrect_option_two, incorrect_option_three,
                japanese_answer, english_translation, mastery_level
            FROM questions
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}
