//! Lexicon search seam.
//!
//! Maintenance operations describe their target questions with a search.
//! The resolver turns that search into question identifiers for one quiz type.

use crate::error::Result;
use crate::models::{QuizType, TargetSet};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchSpec {
    Words(Vec<String>),
}

impl SearchSpec {
    /// Reads one word per line; blank lines and `#` comments are skipped.
    pub fn from_word_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let words = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Ok(SearchSpec::Words(words))
    }
}

pub trait QuestionResolver {
    /// `None` selects every question. A search matching nothing yields an
    /// empty explicit set; callers check
    /// [`TargetSet::is_empty_selection`] and skip the operation.
    fn resolve(
        &self,
        lexicon: &str,
        quiz_type: QuizType,
        spec: Option<&SearchSpec>,
    ) -> Result<TargetSet>;
}

/// Resolves word-list searches without consulting a lexicon.
#[derive(Default)]
pub struct WordListResolver;

impl QuestionResolver for WordListResolver {
    fn resolve(
        &self,
        _lexicon: &str,
        quiz_type: QuizType,
        spec: Option<&SearchSpec>,
    ) -> Result<TargetSet> {
        let Some(SearchSpec::Words(words)) = spec else {
            return Ok(TargetSet::All);
        };

        let questions: BTreeSet<String> = words
            .iter()
            .filter(|w| !w.trim().is_empty())
            .map(|w| quiz_type.question_for_word(w))
            .collect();
        Ok(TargetSet::Questions(questions))
    }
}
