mod grammar_point;
mod ids;
mod question;

pub use grammar_point::{GrammarPoint, JlptLevel, ParseJlptLevelError};
pub use ids::{GrammarPointId, QuestionId};
pub use question::{Mastery, MasteryError, Question};
