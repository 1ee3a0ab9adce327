//! Application configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file) is valid.

use crate::error::{CardboxError, Result};
use crate::models::{CardboxPolicy, QuizPartition, QuizType};
use crate::scheduler::DEFAULT_BATCH_SIZE;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CardboxConfig {
    pub database_path: PathBuf,
    /// Known lexicon names. Empty accepts any lexicon.
    pub lexicons: Vec<String>,
    /// Records per atomic bulk update.
    pub batch_size: usize,
    /// Review interval in days for box 1, 2, ...
    pub intervals: CardboxPolicy,
}

impl Default for CardboxConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cardbox.sqlite3"),
            lexicons: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            intervals: CardboxPolicy::default(),
        }
    }
}

impl CardboxConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: CardboxConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Loads `path` when given, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CardboxError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.lexicons.iter().any(|l| l.trim().is_empty()) {
            return Err(CardboxError::InvalidConfig(
                "lexicon names must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> &CardboxPolicy {
        &self.intervals
    }

    /// Checks a (lexicon, quiz type) pairing before any store access.
    pub fn partition(&self, lexicon: &str, quiz_type: &str) -> Result<QuizPartition> {
        let quiz_type: QuizType = quiz_type.parse()?;
        if !self.lexicons.is_empty() && !self.lexicons.iter().any(|l| l == lexicon) {
            return Err(CardboxError::UnknownLexicon(lexicon.to_string()));
        }
        Ok(QuizPartition::new(lexicon, quiz_type))
    }
}
