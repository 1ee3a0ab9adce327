//! JSON import/export of cardbox schedules.
//! Saves every record of one (lexicon, quiz type) partition to a file and
//! loads it back into a store.

use crate::database::{CardboxStore, validate_record};
use crate::error::Result;
use crate::models::{QuizPartition, QuizType, ScheduleRecord, TargetSet};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardboxSnapshot {
    pub lexicon: String,
    pub quiz_type: QuizType,
    pub records: Vec<ScheduleRecord>,
}

impl CardboxSnapshot {
    pub fn partition(&self) -> QuizPartition {
        QuizPartition::new(self.lexicon.clone(), self.quiz_type)
    }
}

/// Writes all records of `partition` to a JSON file. Returns the record count.
pub fn export_json_to_path<P: AsRef<Path>>(
    store: &dyn CardboxStore,
    partition: &QuizPartition,
    path: P,
) -> Result<usize> {
    let snapshot = CardboxSnapshot {
        lexicon: partition.lexicon.clone(),
        quiz_type: partition.quiz_type,
        records: store.records(partition, &TargetSet::All)?,
    };

    let json_string = serde_json::to_string_pretty(&snapshot)?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(json_string.as_bytes())?;

    info!(
        "Exported {} record(s) of {} to '{}'",
        snapshot.records.len(),
        partition,
        path.as_ref().display()
    );
    Ok(snapshot.records.len())
}

/// Reads a snapshot file, checking every record before anything is stored.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<CardboxSnapshot> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let snapshot: CardboxSnapshot = serde_json::from_str(&contents)?;
    for record in &snapshot.records {
        validate_record(record)?;
    }
    Ok(snapshot)
}

/// Stores every record of a snapshot in one atomic write. Returns the number
/// of records stored.
pub fn import_snapshot(store: &dyn CardboxStore, snapshot: &CardboxSnapshot) -> Result<usize> {
    let partition = snapshot.partition();
    let count = store.upsert_all(&partition, &snapshot.records)?;
    info!("Imported {} record(s) into {}", count, partition);
    Ok(count)
}

/// Reads a snapshot file and upserts its records. Returns the partition and record count.
pub fn import_json<P: AsRef<Path>>(
    store: &dyn CardboxStore,
    path: P,
) -> Result<(QuizPartition, usize)> {
    let snapshot = read_snapshot(path)?;
    let count = import_snapshot(store, &snapshot)?;
    Ok((snapshot.partition(), count))
}
