pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;
pub mod scheduler;
pub mod search;

pub use config::CardboxConfig;
pub use error::{CardboxError, Result};
pub use models::{
    CardboxPolicy, QuizPartition, QuizSession, QuizType, ResponseOutcome, ScheduleRecord, TargetSet,
};
