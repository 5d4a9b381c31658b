use bunpo_core::model::{GrammarPoint, GrammarPointId};

use super::mapping::{grammar_point_id_to_i64, map_grammar_point_row};
use super::SqliteRepository;
use crate::feed::Feed;
use crate::repository::{GrammarPointRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl GrammarPointRepository for SqliteRepository {
    async fn insert_grammar_points(&self, points: &[GrammarPoint]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        for point in points {
            sqlx::query(
                r"
                INSERT INTO grammar_points (id, grammar, jlpt, meaning, explanation)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    -- upsert instead of REPLACE so owned questions survive
                    grammar = excluded.grammar,
                    jlpt = excluded.jlpt,
                    meaning = excluded.meaning,
                    explanation = excluded.explanation
                ",
            )
            .bind(grammar_point_id_to_i64(point.id)?)
            .bind(point.grammar.clone())
            .bind(point.level.map(|level| level.as_str()))
            .bind(point.meaning.clone())
            .bind(point.explanation.clone())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        self.refresh_grammar_points().await;
        Ok(())
    }

    async fn list_grammar_points(&self) -> Result<Vec<GrammarPoint>, StorageError> {
        self.query_grammar_points().await
    }

    async fn delete_grammar_point(&self, id: GrammarPointId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM grammar_points WHERE id = ?1")
            .bind(grammar_point_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        self.refresh_all().await;
        Ok(())
    }

    fn watch_grammar_points(&self) -> Feed<Vec<GrammarPoint>> {
        self.feeds.grammar_points()
    }
}

impl SqliteRepository {
    pub(super) async fn query_grammar_points(&self) -> Result<Vec<GrammarPoint>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, grammar, jlpt, meaning, explanation
            FROM grammar_points
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_grammar_point_row).collect()
    }
}
