//! Mastery aggregation: folds per-question mastery into overall and
//! per-grammar-point progress.

use std::collections::HashMap;

use crate::model::{GrammarPoint, GrammarPointId};

/// Upper bound of a single question's mastery counter.
pub const MAX_MASTERY_PER_QUESTION: u32 = 5;

//
// ─── RAW AGGREGATES ────────────────────────────────────────────────────────────
//

/// Store-side totals over every question.
///
/// `sum` is `None` when there are no questions at all, mirroring `SUM()` over
/// an empty table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasteryTotals {
    pub sum: Option<u32>,
    pub count: u32,
}

/// One row of the grouped mastery query; only grammar points with at least
/// one question produce a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrammarPointMasteryRow {
    pub grammar_point_id: GrammarPointId,
    pub sum: Option<u32>,
    pub count: u32,
}

//
// ─── DERIVED PROGRESS ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalMastery {
    pub current: u32,
    pub max: u32,
}

impl TotalMastery {
    /// Progress in `0.0..=1.0`; zero when there is nothing to master.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        ratio(self.current, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarPointWithMastery {
    pub grammar_point: GrammarPoint,
    pub current: u32,
    pub max: u32,
}

impl GrammarPointWithMastery {
    #[must_use]
    pub fn ratio(&self) -> f64 {
        ratio(self.current, self.max)
    }
}

fn ratio(current: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    (f64::from(current) / f64::from(max)).clamp(0.0, 1.0)
}

fn max_for(count: u32) -> u32 {
    count.saturating_mul(MAX_MASTERY_PER_QUESTION)
}

/// Overall progress from the raw sum and question count.
#[must_use]
pub fn compute_total_mastery(sum: Option<u32>, count: u32) -> TotalMastery {
    TotalMastery {
        current: sum.unwrap_or(0),
        max: max_for(count),
    }
}

/// Pairs every grammar point with its mastery, keeping the input order.
///
/// Grammar points without a row (no questions) get `current = max = 0`.
#[must_use]
pub fn compute_grammar_points_with_mastery(
    grammar_points: &[GrammarPoint],
    rows: &[GrammarPointMasteryRow],
) -> Vec<GrammarPointWithMastery> {
    let by_id: HashMap<GrammarPointId, &GrammarPointMasteryRow> =
        rows.iter().map(|row| (row.grammar_point_id, row)).collect();

    grammar_points
        .iter()
        .map(|point| {
            let (current, count) = by_id
                .get(&point.id)
                .map_or((0, 0), |row| (row.sum.unwrap_or(0), row.count));
            GrammarPointWithMastery {
                grammar_point: point.clone(),
                current,
                max: max_for(count),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JlptLevel;

    fn point(id: u64) -> GrammarPoint {
        GrammarPoint::new(
            GrammarPointId::new(id),
            format!("grammar {id}"),
            Some(JlptLevel::N5),
            "meaning",
            "explanation",
        )
    }

    fn row(id: u64, sum: Option<u32>, count: u32) -> GrammarPointMasteryRow {
        GrammarPointMasteryRow {
            grammar_point_id: GrammarPointId::new(id),
            sum,
            count,
        }
    }

    #[test]
    fn total_mastery_treats_missing_sum_as_zero() {
        assert_eq!(
            compute_total_mastery(None, 0),
            TotalMastery { current: 0, max: 0 }
        );
        assert_eq!(
            compute_total_mastery(None, 3),
            TotalMastery { current: 0, max: 15 }
        );
    }

    #[test]
    fn total_mastery_max_is_count_times_five() {
        for (sum, count) in [(Some(0), 1), (Some(12), 4), (Some(50), 10), (Some(7), 120)] {
            let total = compute_total_mastery(sum, count);
            assert_eq!(total.max, count * 5);
            assert_eq!(total.current, sum.unwrap_or(0));
        }
    }

    #[test]
    fn grammar_points_without_rows_report_zero() {
        let points = vec![point(3), point(1), point(2)];
        let rows = vec![row(1, Some(4), 2)];

        let result = compute_grammar_points_with_mastery(&points, &rows);

        let ids: Vec<u64> = result.iter().map(|p| p.grammar_point.id.value()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!((result[0].current, result[0].max), (0, 0));
        assert_eq!((result[1].current, result[1].max), (4, 10));
        assert_eq!((result[2].current, result[2].max), (0, 0));
    }

    #[test]
    fn rows_for_unknown_grammar_points_are_ignored() {
        let points = vec![point(1)];
        let rows = vec![row(1, Some(1), 1), row(9, Some(5), 1)];

        let result = compute_grammar_points_with_mastery(&points, &rows);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].current, 1);
    }

    #[test]
    fn null_sum_in_existing_row_counts_as_zero() {
        let result = compute_grammar_points_with_mastery(&[point(1)], &[row(1, None, 2)]);
        assert_eq!((result[0].current, result[0].max), (0, 10));
    }

    #[test]
    fn two_points_three_questions_example() {
        // Point 1 owns questions at mastery 3 and 4, point 2 one question at 5.
        let points = vec![point(1), point(2)];
        let rows = vec![row(1, Some(7), 2), row(2, Some(5), 1)];

        let result = compute_grammar_points_with_mastery(&points, &rows);

        assert_eq!((result[0].current, result[0].max), (7, 10));
        assert_eq!((result[1].current, result[1].max), (5, 5));
    }

    #[test]
    fn ratio_is_zero_without_questions() {
        assert!(TotalMastery::default().ratio().abs() < f64::EPSILON);
        let total = compute_total_mastery(Some(5), 2);
        assert!((total.ratio() - 0.5).abs() < f64::EPSILON);
    }
}
