//! Backlog measurement: questions whose due date has arrived.
use crate::database::CardboxStore;
use crate::error::Result;
use crate::models::{QuizPartition, TargetSet};
use chrono::NaiveDate;
use std::collections::BTreeSet;

pub struct BacklogEngine<'a> {
    store: &'a dyn CardboxStore,
}

impl<'a> BacklogEngine<'a> {
    pub fn new(store: &'a dyn CardboxStore) -> Self {
        Self { store }
    }

    pub fn ready_questions(
        &self,
        partition: &QuizPartition,
        reference: NaiveDate,
        target: &TargetSet,
    ) -> Result<BTreeSet<String>> {
        self.store.query_due_on_or_before(partition, reference, target)
    }

    pub fn ready_count(
        &self,
        partition: &QuizPartition,
        reference: NaiveDate,
        target: &TargetSet,
    ) -> Result<usize> {
        Ok(self.ready_questions(partition, reference, target)?.len())
    }
}

/// Ready count over a due-date snapshot sorted ascending.
pub fn ready_in_sorted(due_dates: &[NaiveDate], reference: NaiveDate) -> usize {
    due_dates.partition_point(|due| *due <= reference)
}
