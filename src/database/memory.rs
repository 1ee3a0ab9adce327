//! In-process store, used when no database file is wanted (tests, dry runs).
use super::store::{CardboxStore, shift_date, validate_record};
use crate::error::{CardboxError, Result};
use crate::models::{CardboxPolicy, QuizPartition, ScheduleRecord, TargetSet};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Partitions = HashMap<QuizPartition, BTreeMap<String, ScheduleRecord>>;

#[derive(Default)]
pub struct MemoryCardboxStore {
    partitions: RwLock<Partitions>,
}

impl MemoryCardboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Partitions>> {
        self.partitions
            .read()
            .map_err(|_| CardboxError::StoreUnavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Partitions>> {
        self.partitions
            .write()
            .map_err(|_| CardboxError::StoreUnavailable("store lock poisoned".to_string()))
    }

    /// Computes new due dates for all listed records first, then applies them,
    /// so a failure leaves every record untouched.
    fn bulk_update<F>(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        mut new_due: F,
    ) -> Result<usize>
    where
        F: FnMut(&ScheduleRecord) -> Result<NaiveDate>,
    {
        let mut partitions = self.write()?;
        let Some(records) = partitions.get_mut(partition) else {
            return Ok(0);
        };

        let mut pending = Vec::new();
        for question in question_ids {
            if let Some(record) = records.get(question) {
                pending.push((question, new_due(record)?));
            }
        }

        for (question, due) in &pending {
            if let Some(record) = records.get_mut(*question) {
                record.due_date = *due;
            }
        }
        Ok(pending.len())
    }
}

impl CardboxStore for MemoryCardboxStore {
    fn get(&self, partition: &QuizPartition, question_id: &str) -> Result<Option<ScheduleRecord>> {
        Ok(self
            .read()?
            .get(partition)
            .and_then(|records| records.get(question_id))
            .cloned())
    }

    fn upsert(&self, partition: &QuizPartition, record: &ScheduleRecord) -> Result<()> {
        validate_record(record)?;
        self.write()?
            .entry(partition.clone())
            .or_default()
            .insert(record.question_id.clone(), record.clone());
        Ok(())
    }

    fn upsert_all(&self, partition: &QuizPartition, records: &[ScheduleRecord]) -> Result<usize> {
        for record in records {
            validate_record(record)?;
        }
        let mut partitions = self.write()?;
        let stored = partitions.entry(partition.clone()).or_default();
        for record in records {
            stored.insert(record.question_id.clone(), record.clone());
        }
        Ok(records.len())
    }

    fn update_with(
        &self,
        partition: &QuizPartition,
        question_id: &str,
        update: &mut dyn FnMut(Option<&ScheduleRecord>) -> Option<ScheduleRecord>,
    ) -> Result<Option<ScheduleRecord>> {
        let mut partitions = self.write()?;
        let records = partitions.entry(partition.clone()).or_default();

        match update(records.get(question_id)) {
            Some(updated) => {
                validate_record(&updated)?;
                records.insert(question_id.to_string(), updated.clone());
                Ok(Some(updated))
            }
            None => Ok(records.get(question_id).cloned()),
        }
    }

    fn query_due_on_or_before(
        &self,
        partition: &QuizPartition,
        date: NaiveDate,
        target: &TargetSet,
    ) -> Result<BTreeSet<String>> {
        let partitions = self.read()?;
        Ok(partitions
            .get(partition)
            .map(|records| {
                records
                    .values()
                    .filter(|r| r.is_ready(date) && target.contains(&r.question_id))
                    .map(|r| r.question_id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn records(
        &self,
        partition: &QuizPartition,
        target: &TargetSet,
    ) -> Result<Vec<ScheduleRecord>> {
        let partitions = self.read()?;
        Ok(partitions
            .get(partition)
            .map(|records| {
                records
                    .values()
                    .filter(|r| target.contains(&r.question_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn bulk_set_due_date(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        due_date: NaiveDate,
    ) -> Result<usize> {
        self.bulk_update(partition, question_ids, |_| Ok(due_date))
    }

    fn bulk_shift_due_date(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        days: i64,
    ) -> Result<usize> {
        self.bulk_update(partition, question_ids, |r| shift_date(r.due_date, days))
    }

    fn bulk_recompute_from_box_level(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        policy: &CardboxPolicy,
        reference: NaiveDate,
    ) -> Result<usize> {
        self.bulk_update(partition, question_ids, |r| {
            shift_date(reference, i64::from(policy.interval_days(r.box_level)))
        })
    }

    fn box_level_counts(&self, partition: &QuizPartition) -> Result<BTreeMap<u32, usize>> {
        let partitions = self.read()?;
        let mut counts = BTreeMap::new();
        if let Some(records) = partitions.get(partition) {
            for record in records.values() {
                *counts.entry(record.box_level).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
