use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates grammar points, questions (cascading on grammar point removal) and
/// the lookup index on `grammar_point_id`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS grammar_points (
                    id INTEGER PRIMARY KEY,
                    grammar TEXT NOT NULL,
                    jlpt TEXT,
                    meaning TEXT NOT NULL,
                    explanation TEXT NOT NULL,
                    -- legacy per-point counter, aggregation reads questions instead
                    mastery_level INTEGER NOT NULL DEFAULT 0
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    grammar_point_id INTEGER NOT NULL,
                    japanese_question TEXT NOT NULL,
                    correct_option TEXT NOT NULL,
                    incorrect_option_one TEXT NOT NULL,
                    incorrect_option_two TEXT NOT NULL,
                    incorrect_option_three TEXT NOT NULL,
                    japanese_answer TEXT NOT NULL,
                    english_translation TEXT NOT NULL,
                    mastery_level INTEGER NOT NULL DEFAULT 0
                        CHECK (mastery_level BETWEEN 0 AND 5),
                    FOREIGN KEY (grammar_point_id) REFERENCES grammar_points(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_grammar_point
                    ON questions(grammar_point_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
