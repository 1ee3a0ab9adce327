//! Error type shared by the scheduling core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardboxError {
    #[error("Unknown lexicon: {0}")]
    UnknownLexicon(String),

    #[error("Unknown quiz type: {0}")]
    UnknownQuizType(String),

    #[error("Unknown response outcome: {0}")]
    UnknownOutcome(String),

    #[error("Invalid reschedule request: {0}")]
    InvalidStrategy(String),

    #[error("Invalid cardbox policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid schedule record for '{question}': {reason}")]
    InvalidRecord { question: String, reason: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CardboxError {
    /// True for errors raised before any store access (bad input or config).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CardboxError::UnknownLexicon(_)
                | CardboxError::UnknownQuizType(_)
                | CardboxError::UnknownOutcome(_)
                | CardboxError::InvalidStrategy(_)
                | CardboxError::InvalidPolicy(_)
                | CardboxError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CardboxError>;
