use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cardbox scheduling state of one question within a partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub question_id: String,
    pub box_level: u32,
    pub due_date: NaiveDate,
    pub last_reviewed: Option<NaiveDate>,
    pub review_count: u32,
}

impl ScheduleRecord {
    /// State of a question seen for the first time: box 1, due today.
    pub fn new(question_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            question_id: question_id.into(),
            box_level: 1,
            due_date: today,
            last_reviewed: None,
            review_count: 0,
        }
    }

    /// Ready questions are due on or before `date`.
    pub fn is_ready(&self, date: NaiveDate) -> bool {
        self.due_date <= date
    }
}
