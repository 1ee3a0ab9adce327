//! Storage seam for cardbox scheduling records.
//!
//! Every operation is addressed by a [`QuizPartition`]. Bulk operations are
//! atomic per call: either every listed record is written or none is.
//! Identifiers with no stored record are skipped and not counted.
//!
//! Due dates are limited to years 1 through 9999. Inside that range the
//! ISO text form stored by SQLite sorts the same way as the dates.

use crate::error::{CardboxError, Result};
use crate::models::{CardboxPolicy, QuizPartition, ScheduleRecord, TargetSet};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

pub trait CardboxStore: Send + Sync {
    fn get(&self, partition: &QuizPartition, question_id: &str) -> Result<Option<ScheduleRecord>>;

    /// Creates or overwrites a single record.
    fn upsert(&self, partition: &QuizPartition, record: &ScheduleRecord) -> Result<()>;

    /// Creates or overwrites every record in one atomic write. Returns the
    /// number of records written.
    fn upsert_all(&self, partition: &QuizPartition, records: &[ScheduleRecord]) -> Result<usize>;

    /// Atomic read-modify-write of one record. `update` sees the current
    /// record (if any) and returns the record to store, or `None` to leave
    /// the store untouched. Returns the record as it stands afterwards.
    fn update_with(
        &self,
        partition: &QuizPartition,
        question_id: &str,
        update: &mut dyn FnMut(Option<&ScheduleRecord>) -> Option<ScheduleRecord>,
    ) -> Result<Option<ScheduleRecord>>;

    /// Questions with `due_date <= date`, restricted to `target`.
    fn query_due_on_or_before(
        &self,
        partition: &QuizPartition,
        date: NaiveDate,
        target: &TargetSet,
    ) -> Result<BTreeSet<String>>;

    /// Stored records restricted to `target`, ordered by question id.
    fn records(
        &self,
        partition: &QuizPartition,
        target: &TargetSet,
    ) -> Result<Vec<ScheduleRecord>>;

    fn bulk_set_due_date(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        due_date: NaiveDate,
    ) -> Result<usize>;

    /// Moves each due date by `days` (negative moves it earlier).
    fn bulk_shift_due_date(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        days: i64,
    ) -> Result<usize>;

    /// Sets `due_date = reference + policy.interval_days(box_level)`.
    fn bulk_recompute_from_box_level(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        policy: &CardboxPolicy,
        reference: NaiveDate,
    ) -> Result<usize>;

    /// Number of stored questions per box level.
    fn box_level_counts(&self, partition: &QuizPartition) -> Result<BTreeMap<u32, usize>>;
}

fn in_range(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// `date + days`, or an error when the result falls outside years 1..=9999.
pub fn shift_date(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    chrono::Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .filter(|shifted| in_range(*shifted))
        .ok_or_else(|| {
            CardboxError::InvalidStrategy(format!(
                "shifting {date} by {days} days leaves the supported date range"
            ))
        })
}

/// Checks what every store requires of a record before writing it.
pub fn validate_record(record: &ScheduleRecord) -> Result<()> {
    let reason = if record.box_level < 1 {
        "box level must be at least 1"
    } else if !in_range(record.due_date) {
        "due date must fall in years 1 to 9999"
    } else {
        return Ok(());
    };
    Err(CardboxError::InvalidRecord {
        question: record.question_id.clone(),
        reason: reason.to_string(),
    })
}
