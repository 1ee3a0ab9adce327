//! Evaluated answer to a single quiz question.
use crate::error::{CardboxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a question ended up at the end of a quiz.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseOutcome {
    /// Not answered yet. Leaves the schedule alone.
    #[default]
    Incomplete,
    Correct,
    /// Never attempted before the quiz ended.
    Missed,
    Incorrect,
}

impl ResponseOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseOutcome::Incomplete => "incomplete",
            ResponseOutcome::Correct => "correct",
            ResponseOutcome::Missed => "missed",
            ResponseOutcome::Incorrect => "incorrect",
        }
    }
}

impl fmt::Display for ResponseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseOutcome {
    type Err = CardboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "incomplete" => Ok(ResponseOutcome::Incomplete),
            "correct" => Ok(ResponseOutcome::Correct),
            "missed" => Ok(ResponseOutcome::Missed),
            "incorrect" => Ok(ResponseOutcome::Incorrect),
            _ => Err(CardboxError::UnknownOutcome(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub question_index: usize,
    pub name: String,
    pub outcome: ResponseOutcome,
}

impl QuizResponse {
    pub fn new(question_index: usize, name: impl Into<String>) -> Self {
        Self {
            question_index,
            name: name.into(),
            outcome: ResponseOutcome::Incomplete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome != ResponseOutcome::Incomplete
    }
}
