//! Quiz types and the (lexicon, quiz type) partition every record lives in.
use crate::error::{CardboxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuizType {
    Anagrams,
    AnagramsWithHooks,
    Subanagrams,
    AnagramJumble,
    SubanagramJumble,
    Hooks,
    WordListRecall,
}

impl QuizType {
    pub const ALL: [QuizType; 7] = [
        QuizType::Anagrams,
        QuizType::AnagramsWithHooks,
        QuizType::Subanagrams,
        QuizType::AnagramJumble,
        QuizType::SubanagramJumble,
        QuizType::Hooks,
        QuizType::WordListRecall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QuizType::Anagrams => "Anagrams",
            QuizType::AnagramsWithHooks => "Anagrams with Hooks",
            QuizType::Subanagrams => "Subanagrams",
            QuizType::AnagramJumble => "Anagram Jumble",
            QuizType::SubanagramJumble => "Subanagram Jumble",
            QuizType::Hooks => "Hooks",
            QuizType::WordListRecall => "Word List Recall",
        }
    }

    /// Anagram-style quizzes ask one question per alphagram, not per word.
    pub fn uses_alphagrams(self) -> bool {
        matches!(
            self,
            QuizType::Anagrams
                | QuizType::AnagramsWithHooks
                | QuizType::Subanagrams
                | QuizType::AnagramJumble
                | QuizType::SubanagramJumble
        )
    }

    /// Question identifier a word maps to under this quiz type.
    pub fn question_for_word(self, word: &str) -> String {
        let upper = word.trim().to_uppercase();
        if self.uses_alphagrams() {
            alphagram(&upper)
        } else {
            upper
        }
    }
}

/// Letters of a word in sorted order.
pub fn alphagram(word: &str) -> String {
    let mut letters: Vec<char> = word.chars().collect();
    letters.sort_unstable();
    letters.into_iter().collect()
}

impl fmt::Display for QuizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QuizType {
    type Err = CardboxError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        QuizType::ALL
            .into_iter()
            .find(|t| normalize(t.name()) == wanted)
            .ok_or_else(|| CardboxError::UnknownQuizType(s.to_string()))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Logical partition of the record store. Passed explicitly into every
/// core operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuizPartition {
    pub lexicon: String,
    pub quiz_type: QuizType,
}

impl QuizPartition {
    pub fn new(lexicon: impl Into<String>, quiz_type: QuizType) -> Self {
        Self {
            lexicon: lexicon.into(),
            quiz_type,
        }
    }
}

impl fmt::Display for QuizPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.lexicon, self.quiz_type)
    }
}
