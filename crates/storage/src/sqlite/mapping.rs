use bunpo_core::model::{
    GrammarPoint, GrammarPointId, JlptLevel, Mastery, Question, QuestionId,
};
use bunpo_core::{GrammarPointMasteryRow, MasteryTotals};
use sqlx::Row;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn grammar_point_id_to_i64(id: GrammarPointId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("grammar_point_id overflow".into()))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

pub(crate) fn grammar_point_id_from_i64(v: i64) -> Result<GrammarPointId, StorageError> {
    Ok(GrammarPointId::new(i64_to_u64("grammar_point_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn mastery_from_i64(v: i64) -> Result<Mastery, StorageError> {
    Mastery::new(i64_to_u32("mastery_level", v)?).map_err(ser)
}

pub(crate) fn parse_level(raw: Option<String>) -> Result<Option<JlptLevel>, StorageError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<JlptLevel>().map_err(ser))
        .transpose()
}

pub(crate) fn map_grammar_point_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<GrammarPoint, StorageError> {
    Ok(GrammarPoint {
        id: grammar_point_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        grammar: row.try_get("grammar").map_err(ser)?,
        level: parse_level(row.try_get("jlpt").map_err(ser)?)?,
        meaning: row.try_get("meaning").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
    })
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    Ok(Question {
        id: question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        grammar_point_id: grammar_point_id_from_i64(
            row.try_get::<i64, _>("grammar_point_id").map_err(ser)?,
        )?,
        prompt: row.try_get("japanese_question").map_err(ser)?,
        correct_option: row.try_get("correct_option").map_err(ser)?,
        incorrect_options: [
            row.try_get("incorrect_option_one").map_err(ser)?,
            row.try_get("incorrect_option_two").map_err(ser)?,
            row.try_get("incorrect_option_three").map_err(ser)?,
        ],
        answer: row.try_get("japanese_answer").map_err(ser)?,
        translation: row.try_get("english_translation").map_err(ser)?,
        mastery: mastery_from_i64(row.try_get::<i64, _>("mastery_level").map_err(ser)?)?,
    })
}

/// `SUM()` is NULL over an empty set, so the sum stays optional.
pub(crate) fn map_totals_row(row: &sqlx::sqlite::SqliteRow) -> Result<MasteryTotals, StorageError> {
    let sum = row
        .try_get::<Option<i64>, _>("current_mastery")
        .map_err(ser)?
        .map(|v| i64_to_u32("current_mastery", v))
        .transpose()?;
    let count = i64_to_u32(
        "question_count",
        row.try_get::<i64, _>("question_count").map_err(ser)?,
    )?;
    Ok(MasteryTotals { sum, count })
}

pub(crate) fn map_mastery_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<GrammarPointMasteryRow, StorageError> {
    let totals = map_totals_row(row)?;
    Ok(GrammarPointMasteryRow {
        grammar_point_id: grammar_point_id_from_i64(
            row.try_get::<i64, _>("grammar_point_id").map_err(ser)?,
        )?,
        sum: totals.sum,
        count: totals.count,
    })
}
