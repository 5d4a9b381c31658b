use thiserror::Error;

use super::ids::{GrammarPointId, QuestionId};
use crate::mastery::MAX_MASTERY_PER_QUESTION;

//
// ─── MASTERY ───────────────────────────────────────────────────────────────────
//

/// How well a single question has been learned, bounded to
/// `0..=MAX_MASTERY_PER_QUESTION`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mastery(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mastery {0} is above the per-question maximum")]
pub struct MasteryError(pub u32);

impl Mastery {
    pub const ZERO: Mastery = Mastery(0);
    pub const MAX: Mastery = Mastery(MAX_MASTERY_PER_QUESTION as u8);

    /// # Errors
    ///
    /// Returns `MasteryError` if `value` is above the per-question maximum.
    pub fn new(value: u32) -> Result<Self, MasteryError> {
        if value > MAX_MASTERY_PER_QUESTION {
            return Err(MasteryError(value));
        }
        u8::try_from(value).map(Self).map_err(|_| MasteryError(value))
    }

    #[must_use]
    pub fn value(self) -> u32 {
        u32::from(self.0)
    }

    /// One step up, clamped at the maximum.
    #[must_use]
    pub fn increment(self) -> Self {
        if self >= Self::MAX {
            Self::MAX
        } else {
            Self(self.0 + 1)
        }
    }

    #[must_use]
    pub fn is_max(self) -> bool {
        self >= Self::MAX
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question attached to a grammar point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub grammar_point_id: GrammarPointId,
    pub prompt: String,
    pub correct_option: String,
    pub incorrect_options: [String; 3],
    /// Free-form annotation shown once the question is answered.
    pub answer: String,
    pub translation: String,
    pub mastery: Mastery,
}

impl Question {
    /// All four options, correct one first.
    #[must_use]
    pub fn options(&self) -> [&str; 4] {
        [
            self.correct_option.as_str(),
            self.incorrect_options[0].as_str(),
            self.incorrect_options[1].as_str(),
            self.incorrect_options[2].as_str(),
        ]
    }

    /// Exact string comparison against the correct option.
    #[must_use]
    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_option == option
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mastery_rejects_values_above_max() {
        assert_eq!(Mastery::new(6), Err(MasteryError(6)));
        assert_eq!(Mastery::new(5).unwrap(), Mastery::MAX);
    }

    #[test]
    fn increment_clamps_at_max() {
        let mut m = Mastery::ZERO;
        for _ in 0..10 {
            m = m.increment();
        }
        assert_eq!(m, Mastery::MAX);
        assert!(m.is_max());
        assert_eq!(Mastery::new(3).unwrap().increment().value(), 4);
    }

    #[test]
    fn correctness_is_exact_string_equality() {
        let q = Question {
            id: QuestionId::new(1),
            grammar_point_id: GrammarPointId::new(1),
            prompt: "私は学生___。".into(),
            correct_option: "です".into(),
            incorrect_options: ["だ".into(), "ます".into(), "でした".into()],
            answer: "私は学生です。".into(),
            translation: "I am a student.".into(),
            mastery: Mastery::ZERO,
        };
        assert!(q.is_correct("です"));
        assert!(!q.is_correct("です "));
        assert!(!q.is_correct("だ"));
        assert_eq!(q.options()[0], "です");
    }
}
