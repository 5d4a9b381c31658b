#![forbid(unsafe_code)]

pub mod mastery;
pub mod model;
pub mod quiz;

pub use mastery::{
    GrammarPointMasteryRow, GrammarPointWithMastery, MAX_MASTERY_PER_QUESTION, MasteryTotals,
    TotalMastery, compute_grammar_points_with_mastery, compute_total_mastery,
};
pub use quiz::{
    CurrentQuestion, GrammarTip, LoadStatus, MasteryUpdate, QUIZ_SIZE, QuizError, QuizMachine,
    QuizProgress, QuizSession, QuizState,
};
