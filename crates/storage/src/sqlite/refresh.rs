use bunpo_core::{GrammarPointMasteryRow, MasteryTotals};
use tracing::{debug, warn};

use super::SqliteRepository;
use super::mapping::{map_mastery_row, map_totals_row};
use crate::feed::{Feed, Observed};
use crate::repository::{MasteryRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn logged<T>(feed: &'static str, value: Observed<T>) -> Observed<T> {
    if let Err(err) = &value {
        warn!(feed, error = %err, "feed query failed");
    }
    value
}

impl MasteryRepository for SqliteRepository {
    fn watch_total_mastery(&self) -> Feed<MasteryTotals> {
        self.feeds.totals()
    }

    fn watch_mastery_by_grammar_point(&self) -> Feed<Vec<GrammarPointMasteryRow>> {
        self.feeds.by_grammar_point()
    }
}

impl SqliteRepository {
    async fn query_totals(&self) -> Observed<MasteryTotals> {
        let row = sqlx::query(
            r"
            SELECT SUM(mastery_level) AS current_mastery, COUNT(id) AS question_count
            FROM questions
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_totals_row(&row)
    }

    async fn query_by_grammar_point(&self) -> Observed<Vec<GrammarPointMasteryRow>> {
        let rows = sqlx::query(
            r"
            SELECT
                grammar_point_id,
                SUM(mastery_level) AS current_mastery,
                COUNT(id) AS question_count
            FROM questions
            GROUP BY grammar_point_id
            ORDER BY grammar_point_id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_mastery_row).collect()
    }

    /// Re-publishes the grammar point feed.
    pub(super) async fn refresh_grammar_points(&self) {
        let _serialized = self.refresh_lock.lock().await;
        let value = self.query_grammar_points().await;
        self.feeds
            .publish_grammar_points(logged("grammar_points", value));
    }

    /// Re-publishes questions and both mastery aggregates.
    pub(super) async fn refresh_questions(&self) {
        let _serialized = self.refresh_lock.lock().await;
        let questions = self.query_questions().await;
        self.feeds.publish_questions(logged("questions", questions));
        let totals = self.query_totals().await;
        self.feeds.publish_totals(logged("total_mastery", totals));
        let rows = self.query_by_grammar_point().await;
        self.feeds
            .publish_by_grammar_point(logged("mastery_by_grammar_point", rows));
    }

    pub(super) async fn refresh_all(&self) {
        debug!("refreshing all sqlite feeds");
        self.refresh_grammar_points().await;
        self.refresh_questions().await;
    }
}
