use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ids::GrammarPointId;

/// JLPT proficiency level a grammar point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JlptLevel {
    N5,
    N4,
    N3,
    N2,
    N1,
}

impl JlptLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JlptLevel::N5 => "N5",
            JlptLevel::N4 => "N4",
            JlptLevel::N3 => "N3",
            JlptLevel::N2 => "N2",
            JlptLevel::N1 => "N1",
        }
    }
}

impl fmt::Display for JlptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid JLPT level: {0}")]
pub struct ParseJlptLevelError(String);

impl FromStr for JlptLevel {
    type Err = ParseJlptLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N5" => Ok(JlptLevel::N5),
            "N4" => Ok(JlptLevel::N4),
            "N3" => Ok(JlptLevel::N3),
            "N2" => Ok(JlptLevel::N2),
            "N1" => Ok(JlptLevel::N1),
            _ => Err(ParseJlptLevelError(s.to_owned())),
        }
    }
}

/// A Japanese grammar construct that owns zero or more questions.
///
/// Loaded once from the seed dataset and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarPoint {
    pub id: GrammarPointId,
    pub grammar: String,
    pub level: Option<JlptLevel>,
    pub meaning: String,
    pub explanation: String,
}

impl GrammarPoint {
    #[must_use]
    pub fn new(
        id: GrammarPointId,
        grammar: impl Into<String>,
        level: Option<JlptLevel>,
        meaning: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            id,
            grammar: grammar.into(),
            level,
            meaning: meaning.into(),
            explanation: explanation.into(),
        }
    }
}
