//! Per-question schedule transitions after a quiz.
//!
//! Correct answers promote a question one box; a missed or incorrect answer
//! sends it back to box 1. Incomplete responses never touch the store.

use crate::database::{CardboxStore, shift_date};
use crate::error::Result;
use crate::models::{CardboxPolicy, QuizPartition, ResponseOutcome, ScheduleRecord};
use chrono::NaiveDate;
use log::debug;

pub struct ResponseProcessor {
    policy: CardboxPolicy,
}

impl ResponseProcessor {
    pub fn new(policy: CardboxPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CardboxPolicy {
        &self.policy
    }

    /// Applies one evaluated response. Returns the record as stored
    /// afterwards, or `None` for an incomplete response to an unseen question.
    pub fn apply(
        &self,
        store: &dyn CardboxStore,
        partition: &QuizPartition,
        question_id: &str,
        outcome: ResponseOutcome,
        today: NaiveDate,
    ) -> Result<Option<ScheduleRecord>> {
        if outcome == ResponseOutcome::Incomplete {
            return store.get(partition, question_id);
        }

        let mut failure = None;
        let result = store.update_with(partition, question_id, &mut |current| {
            let base = current
                .cloned()
                .unwrap_or_else(|| ScheduleRecord::new(question_id, today));
            match self.next_record(base, outcome, today) {
                Ok(next) => next,
                Err(e) => {
                    failure = Some(e);
                    None
                }
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }

        if let Some(record) = &result {
            debug!(
                "{partition} {question_id}: {outcome} -> box {} due {}",
                record.box_level, record.due_date
            );
        }
        Ok(result)
    }

    /// Pure transition function behind [`apply`](Self::apply).
    pub fn next_record(
        &self,
        mut record: ScheduleRecord,
        outcome: ResponseOutcome,
        today: NaiveDate,
    ) -> Result<Option<ScheduleRecord>> {
        record.box_level = match outcome {
            ResponseOutcome::Incomplete => return Ok(None),
            ResponseOutcome::Correct => record.box_level.max(1).saturating_add(1),
            ResponseOutcome::Missed | ResponseOutcome::Incorrect => 1,
        };
        let interval = self.policy.interval_days(record.box_level);
        record.due_date = shift_date(today, i64::from(interval))?;
        record.review_count = record.review_count.saturating_add(1);
        record.last_reviewed = Some(today);
        Ok(Some(record))
    }
}

impl Default for ResponseProcessor {
    fn default() -> Self {
        Self::new(CardboxPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryCardboxStore, SqliteCardboxStore};
    use crate::models::QuizType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn partition() -> QuizPartition {
        QuizPartition::new("CSW21", QuizType::Anagrams)
    }

    fn seeded(store: &dyn CardboxStore, level: u32, due: NaiveDate) {
        let record = ScheduleRecord {
            question_id: "AERST".to_string(),
            box_level: level,
            due_date: due,
            last_reviewed: None,
            review_count: 7,
        };
        store.upsert(&partition(), &record).unwrap();
    }

    #[test]
    fn test_correct_promotes() {
        let store = MemoryCardboxStore::new();
        let processor = ResponseProcessor::default();
        let overdue = today() - chrono::Duration::days(5);
        seeded(&store, 2, overdue);

        let record = processor
            .apply(&store, &partition(), "AERST", ResponseOutcome::Correct, today())
            .unwrap()
            .unwrap();

        assert_eq!(record.box_level, 3);
        assert_eq!(
            record.due_date,
            today() + chrono::Duration::days(i64::from(processor.policy().interval_days(3)))
        );
        assert_eq!(record.review_count, 8);
        assert_eq!(record.last_reviewed, Some(today()));
        assert_eq!(store.get(&partition(), "AERST").unwrap(), Some(record));
    }

    #[test]
    fn test_correct_on_unseen_question_starts_from_box_one() {
        let store = MemoryCardboxStore::new();
        let processor = ResponseProcessor::new(CardboxPolicy::new(vec![1, 3]).unwrap());

        let record = processor
            .apply(&store, &partition(), "EINRST", ResponseOutcome::Correct, today())
            .unwrap()
            .unwrap();
        assert_eq!(record.box_level, 2);
        assert_eq!(record.due_date, today() + chrono::Duration::days(3));
        assert_eq!(record.review_count, 1);
    }

    #[test]
    fn test_level_keeps_growing_past_policy_ceiling() {
        let store = MemoryCardboxStore::new();
        let processor = ResponseProcessor::new(CardboxPolicy::new(vec![1, 3]).unwrap());
        seeded(&store, 5, today());

        let record = processor
            .apply(&store, &partition(), "AERST", ResponseOutcome::Correct, today())
            .unwrap()
            .unwrap();
        assert_eq!(record.box_level, 6);
        assert_eq!(record.due_date, today() + chrono::Duration::days(3));
    }

    #[test]
    fn test_failures_reset_to_box_one() {
        for outcome in [ResponseOutcome::Missed, ResponseOutcome::Incorrect] {
            let store = MemoryCardboxStore::new();
            let processor = ResponseProcessor::default();
            seeded(&store, 9, today() + chrono::Duration::days(100));

            let record = processor
                .apply(&store, &partition(), "AERST", outcome, today())
                .unwrap()
                .unwrap();
            assert_eq!(record.box_level, 1);
            assert_eq!(
                record.due_date,
                today() + chrono::Duration::days(i64::from(processor.policy().interval_days(1)))
            );
            assert_eq!(record.review_count, 8);
        }
    }

    #[test]
    fn test_incomplete_is_a_no_op() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let processor = ResponseProcessor::default();
        seeded(&store, 4, today());
        let before = store.get(&partition(), "AERST").unwrap();

        let after = processor
            .apply(&store, &partition(), "AERST", ResponseOutcome::Incomplete, today())
            .unwrap();
        assert_eq!(after, before);
        assert_eq!(store.get(&partition(), "AERST").unwrap(), before);
    }

    #[test]
    fn test_incomplete_does_not_create_record() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let processor = ResponseProcessor::default();

        let result = processor
            .apply(&store, &partition(), "NEW", ResponseOutcome::Incomplete, today())
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(store.get(&partition(), "NEW").unwrap(), None);
    }

    #[test]
    fn test_correct_always_lands_after_today() {
        let processor = ResponseProcessor::default();
        for level in 1..20 {
            let mut record = ScheduleRecord::new("A", today());
            record.box_level = level;
            let next = processor
                .next_record(record, ResponseOutcome::Correct, today())
                .unwrap()
                .unwrap();
            assert_eq!(next.box_level, level + 1);
            assert!(next.due_date > today());
        }
    }
}
