//! Bulk rescheduling of cardbox questions.
//!
//! Three strategies work over a target set of questions:
//! - Shift by days: move every due date by a fixed number of days
//! - Shift by backlog: move due dates so a chosen number of questions is ready today
//! - By cardbox: forget date drift and recompute due dates from box levels
//!
//! Work is split into batches. Each batch is one atomic store call, and
//! cancellation is checked between batches. Every new due date is worked out
//! before the first write; if a batch still fails, the batches already
//! written get their old due dates back.

use super::backlog::{BacklogEngine, ready_in_sorted};
use crate::database::{CardboxStore, shift_date};
use crate::error::{CardboxError, Result};
use crate::models::{CardboxPolicy, QuizPartition, ScheduleRecord, TargetSet};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RescheduleMode {
    ShiftDays,
    ShiftBacklog,
    ByCardbox,
}

impl FromStr for RescheduleMode {
    type Err = CardboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "shift-days" => Ok(RescheduleMode::ShiftDays),
            "shift-backlog" => Ok(RescheduleMode::ShiftBacklog),
            "by-cardbox" => Ok(RescheduleMode::ByCardbox),
            _ => Err(CardboxError::InvalidStrategy(format!(
                "unknown mode '{s}' (expected shift-days, shift-backlog or by-cardbox)"
            ))),
        }
    }
}

/// A reschedule strategy together with its single parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RescheduleStrategy {
    ShiftDays(i64),
    ShiftBacklog(usize),
    ByCardbox,
}

impl RescheduleStrategy {
    /// Pairs a mode with its parameter, rejecting missing, extra or
    /// out-of-range values.
    pub fn from_parts(mode: RescheduleMode, value: Option<i64>) -> Result<Self> {
        match (mode, value) {
            (RescheduleMode::ShiftDays, Some(days)) => Ok(RescheduleStrategy::ShiftDays(days)),
            (RescheduleMode::ShiftBacklog, Some(size)) => usize::try_from(size)
                .map(RescheduleStrategy::ShiftBacklog)
                .map_err(|_| {
                    CardboxError::InvalidStrategy(format!(
                        "backlog size must not be negative (got {size})"
                    ))
                }),
            (RescheduleMode::ByCardbox, None) => Ok(RescheduleStrategy::ByCardbox),
            (RescheduleMode::ByCardbox, Some(_)) => Err(CardboxError::InvalidStrategy(
                "rescheduling by cardbox takes no value".to_string(),
            )),
            (RescheduleMode::ShiftDays, None) => Err(CardboxError::InvalidStrategy(
                "shifting by days needs a number of days".to_string(),
            )),
            (RescheduleMode::ShiftBacklog, None) => Err(CardboxError::InvalidStrategy(
                "shifting by backlog needs a backlog size".to_string(),
            )),
        }
    }
}

impl fmt::Display for RescheduleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RescheduleStrategy::ShiftDays(days) => write!(f, "shift by {days} days"),
            RescheduleStrategy::ShiftBacklog(size) => write!(f, "shift to a backlog of {size}"),
            RescheduleStrategy::ByCardbox => f.write_str("reschedule by cardbox"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RescheduleOutcome {
    pub updated: usize,
    pub cancelled: bool,
}

/// Shared cancel flag and progress counter for a running reschedule.
#[derive(Clone, Debug, Default)]
pub struct RescheduleControl {
    cancelled: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
}

impl RescheduleControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Number of target questions handled so far. Never decreases.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    fn advance(&self, count: usize) {
        self.processed.fetch_add(count, Ordering::SeqCst);
    }
}

/// Due-date changes a shift-by-backlog needs.
#[derive(Debug, PartialEq, Eq)]
pub struct BacklogPlan {
    /// Days every question moves by.
    pub offset: i64,
    /// Questions tied on the boundary date that go to `today + 1` instead.
    pub held_back: Vec<String>,
}

/// Works out the shift that leaves exactly `min(desired, records.len())`
/// questions ready on `today`.
///
/// The question at position `desired` (by due date, then id) lands on
/// today. Questions sharing its original due date but sorted after it are
/// held back one day so the ready count is exact.
pub fn plan_backlog_shift(
    records: &[ScheduleRecord],
    desired: usize,
    today: NaiveDate,
) -> Option<BacklogPlan> {
    let mut sorted: Vec<&ScheduleRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.question_id.cmp(&b.question_id))
    });
    let dates: Vec<NaiveDate> = sorted.iter().map(|r| r.due_date).collect();

    let first = *dates.first()?;
    let desired = desired.min(dates.len());

    if desired == 0 {
        let tomorrow = today.succ_opt()?;
        return Some(BacklogPlan {
            offset: (tomorrow - first).num_days(),
            held_back: Vec::new(),
        });
    }

    let boundary = dates[desired - 1];
    let ready_after = ready_in_sorted(&dates, boundary);
    let held_back = sorted[desired..ready_after]
        .iter()
        .map(|r| r.question_id.clone())
        .collect();

    Some(BacklogPlan {
        offset: (today - boundary).num_days(),
        held_back,
    })
}

enum Operation {
    Shift(i64),
    Set(NaiveDate),
    Recompute,
}

pub struct RescheduleEngine<'a> {
    store: &'a dyn CardboxStore,
    policy: &'a CardboxPolicy,
    batch_size: usize,
}

impl<'a> RescheduleEngine<'a> {
    pub fn new(store: &'a dyn CardboxStore, policy: &'a CardboxPolicy, batch_size: usize) -> Self {
        Self {
            store,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    /// Runs one reschedule. The target snapshot is read once up front and
    /// every write is derived from it.
    pub fn reschedule(
        &self,
        partition: &QuizPartition,
        target: &TargetSet,
        strategy: RescheduleStrategy,
        today: NaiveDate,
        control: &RescheduleControl,
    ) -> Result<RescheduleOutcome> {
        let snapshot = self.store.records(partition, target)?;
        info!(
            "{partition}: {strategy} over {} stored question(s)",
            snapshot.len()
        );
        if snapshot.is_empty() {
            return Ok(RescheduleOutcome::default());
        }

        let all_ids: Vec<String> = snapshot.iter().map(|r| r.question_id.clone()).collect();
        let work = match strategy {
            RescheduleStrategy::ShiftDays(days) => vec![(Operation::Shift(days), all_ids)],
            RescheduleStrategy::ByCardbox => vec![(Operation::Recompute, all_ids)],
            RescheduleStrategy::ShiftBacklog(desired) => {
                let Some(plan) = plan_backlog_shift(&snapshot, desired, today) else {
                    return Ok(RescheduleOutcome::default());
                };
                debug!(
                    "{partition}: backlog shift of {} days, {} held back",
                    plan.offset,
                    plan.held_back.len()
                );
                let shifted: Vec<String> = {
                    let held: HashSet<&String> = plan.held_back.iter().collect();
                    all_ids.into_iter().filter(|id| !held.contains(id)).collect()
                };
                vec![
                    (Operation::Shift(plan.offset), shifted),
                    (Operation::Set(shift_date(today, 1)?), plan.held_back),
                ]
            }
        };

        let originals: HashMap<&str, &ScheduleRecord> = snapshot
            .iter()
            .map(|r| (r.question_id.as_str(), r))
            .collect();
        self.check_dates(&originals, &work, today)?;

        let mut outcome = RescheduleOutcome::default();
        let mut written: Vec<&String> = Vec::new();
        for (operation, ids) in &work {
            for batch in ids.chunks(self.batch_size) {
                if control.is_cancelled() {
                    warn!(
                        "{partition}: reschedule cancelled after {} update(s)",
                        outcome.updated
                    );
                    outcome.cancelled = true;
                    return Ok(outcome);
                }
                match self.apply_batch(partition, operation, batch, today) {
                    Ok(updated) => outcome.updated += updated,
                    Err(e) => {
                        self.roll_back(partition, &originals, &written);
                        return Err(e);
                    }
                }
                written.extend(batch);
                control.advance(batch.len());
                debug!("{partition}: {} question(s) processed", control.processed());
            }
        }

        if matches!(strategy, RescheduleStrategy::ShiftBacklog(_)) {
            let backlog = BacklogEngine::new(self.store).ready_count(partition, today, target)?;
            info!("{partition}: backlog is now {backlog}");
        }
        info!("{partition}: {} question(s) rescheduled", outcome.updated);
        Ok(outcome)
    }

    /// Computes every new due date from the snapshot without writing, so a
    /// date outside the supported range fails the run before any store change.
    fn check_dates(
        &self,
        originals: &HashMap<&str, &ScheduleRecord>,
        work: &[(Operation, Vec<String>)],
        today: NaiveDate,
    ) -> Result<()> {
        for (operation, ids) in work {
            for record in ids.iter().filter_map(|id| originals.get(id.as_str())) {
                match operation {
                    Operation::Shift(days) => {
                        shift_date(record.due_date, *days)?;
                    }
                    Operation::Recompute => {
                        let interval = self.policy.interval_days(record.box_level);
                        shift_date(today, i64::from(interval))?;
                    }
                    Operation::Set(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Puts the snapshot due dates back on questions from batches that were
    /// written before a later batch failed.
    fn roll_back(
        &self,
        partition: &QuizPartition,
        originals: &HashMap<&str, &ScheduleRecord>,
        written: &[&String],
    ) {
        if written.is_empty() {
            return;
        }
        let mut by_date: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
        for id in written {
            if let Some(record) = originals.get(id.as_str()) {
                by_date.entry(record.due_date).or_default().push((*id).clone());
            }
        }
        for (due, ids) in &by_date {
            if let Err(e) = self.store.bulk_set_due_date(partition, ids, *due) {
                error!("{partition}: could not restore {} due date(s): {e}", ids.len());
            }
        }
        warn!(
            "{partition}: reschedule failed, restored {} question(s)",
            written.len()
        );
    }

    fn apply_batch(
        &self,
        partition: &QuizPartition,
        operation: &Operation,
        batch: &[String],
        today: NaiveDate,
    ) -> Result<usize> {
        match operation {
            Operation::Shift(days) => self.store.bulk_shift_due_date(partition, batch, *days),
            Operation::Set(date) => self.store.bulk_set_due_date(partition, batch, *date),
            Operation::Recompute => {
                self.store
                    .bulk_recompute_from_box_level(partition, batch, self.policy, today)
            }
        }
    }
}
