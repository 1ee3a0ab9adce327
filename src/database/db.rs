//! SQLite-backed cardbox store
//!
//! Keeps one row per (lexicon, quiz type, question) with the question's box
//! level, due date, last review date and review count. Every bulk update runs
//! inside a single transaction.

use super::store::{CardboxStore, shift_date, validate_record};
use crate::error::{CardboxError, Result};
use crate::models::{CardboxPolicy, QuizPartition, ScheduleRecord, TargetSet};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub const SCHEMA_VERSION: i64 = 1;

/// Question ids bound per `IN (...)` query.
const TARGET_CHUNK: usize = 500;

pub struct SqliteCardboxStore {
    conn: Mutex<Connection>,
}

impl SqliteCardboxStore {
    /// Opens (or creates) the database file and checks its schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            CardboxError::StoreUnavailable(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_database(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CardboxError::StoreUnavailable("connection lock poisoned".to_string()))
    }
}

/// Creates the tables if needed and refuses databases written with another schema.
pub fn init_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        (),
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;

    let version: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    if version.parse::<i64>().ok() != Some(SCHEMA_VERSION) {
        return Err(CardboxError::StoreUnavailable(format!(
            "schema version {version} does not match expected {SCHEMA_VERSION}"
        )));
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions (
            lexicon TEXT NOT NULL,
            quiz_type TEXT NOT NULL,
            question TEXT NOT NULL,
            box_level INTEGER NOT NULL CHECK (box_level >= 1),
            due_date TEXT NOT NULL,
            last_reviewed TEXT,
            review_count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (lexicon, quiz_type, question)
        )",
        (),
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS questions_due
         ON questions (lexicon, quiz_type, due_date)",
        (),
    )?;

    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleRecord> {
    Ok(ScheduleRecord {
        question_id: row.get(0)?,
        box_level: row.get(1)?,
        due_date: row.get(2)?,
        last_reviewed: row.get(3)?,
        review_count: row.get(4)?,
    })
}

fn select_record(
    conn: &Connection,
    partition: &QuizPartition,
    question_id: &str,
) -> Result<Option<ScheduleRecord>> {
    let record = conn
        .query_row(
            "SELECT question, box_level, due_date, last_reviewed, review_count
             FROM questions
             WHERE lexicon = ?1 AND quiz_type = ?2 AND question = ?3",
            params![partition.lexicon, partition.quiz_type.name(), question_id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

fn write_record(
    conn: &Connection,
    partition: &QuizPartition,
    record: &ScheduleRecord,
) -> Result<()> {
    validate_record(record)?;
    conn.execute(
        "INSERT INTO questions
            (lexicon, quiz_type, question, box_level, due_date, last_reviewed, review_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (lexicon, quiz_type, question) DO UPDATE SET
            box_level = excluded.box_level,
            due_date = excluded.due_date,
            last_reviewed = excluded.last_reviewed,
            review_count = excluded.review_count",
        params![
            partition.lexicon,
            partition.quiz_type.name(),
            record.question_id,
            record.box_level,
            record.due_date,
            record.last_reviewed,
            record.review_count
        ],
    )?;
    Ok(())
}

/// Runs `sql` (a `SELECT ... WHERE` over one partition) for `target`.
///
/// An explicit target is bound in chunks as `AND question IN (...)`, so only
/// the selected rows are read. Rows come back ordered by question.
fn select_in_target<T, F>(
    conn: &Connection,
    sql: &str,
    leading: &[&dyn ToSql],
    target: &TargetSet,
    mut map: F,
) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let questions: Vec<&String> = match target {
        TargetSet::Questions(questions) if !questions.is_empty() => questions.iter().collect(),
        _ => {
            let mut stmt = conn.prepare(&format!("{sql} ORDER BY question ASC"))?;
            let rows = stmt
                .query_map(leading, &mut map)?
                .collect::<rusqlite::Result<Vec<T>>>()?;
            return Ok(rows);
        }
    };

    let mut rows = Vec::new();
    for chunk in questions.chunks(TARGET_CHUNK) {
        let placeholders = (1..=chunk.len())
            .map(|i| format!("?{}", leading.len() + i))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "{sql} AND question IN ({placeholders}) ORDER BY question ASC"
        ))?;

        let mut values: Vec<&dyn ToSql> = leading.to_vec();
        values.extend(chunk.iter().map(|id| *id as &dyn ToSql));
        let found = stmt
            .query_map(values.as_slice(), &mut map)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        rows.extend(found);
    }
    Ok(rows)
}

impl CardboxStore for SqliteCardboxStore {
    fn get(&self, partition: &QuizPartition, question_id: &str) -> Result<Option<ScheduleRecord>> {
        let conn = self.lock()?;
        select_record(&conn, partition, question_id)
    }

    fn upsert(&self, partition: &QuizPartition, record: &ScheduleRecord) -> Result<()> {
        let conn = self.lock()?;
        write_record(&conn, partition, record)
    }

    fn upsert_all(&self, partition: &QuizPartition, records: &[ScheduleRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in records {
            write_record(&tx, partition, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn update_with(
        &self,
        partition: &QuizPartition,
        question_id: &str,
        update: &mut dyn FnMut(Option<&ScheduleRecord>) -> Option<ScheduleRecord>,
    ) -> Result<Option<ScheduleRecord>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = select_record(&tx, partition, question_id)?;
        let result = match update(current.as_ref()) {
            Some(updated) => {
                write_record(&tx, partition, &updated)?;
                Some(updated)
            }
            None => current,
        };

        tx.commit()?;
        Ok(result)
    }

    fn query_due_on_or_before(
        &self,
        partition: &QuizPartition,
        date: NaiveDate,
        target: &TargetSet,
    ) -> Result<BTreeSet<String>> {
        let conn = self.lock()?;
        let quiz_type = partition.quiz_type.name();
        let questions = select_in_target(
            &conn,
            "SELECT question FROM questions
             WHERE lexicon = ?1 AND quiz_type = ?2 AND due_date <= ?3",
            &[&partition.lexicon as &dyn ToSql, &quiz_type, &date],
            target,
            |row| row.get::<_, String>(0),
        )?;
        Ok(questions.into_iter().collect())
    }

    fn records(
        &self,
        partition: &QuizPartition,
        target: &TargetSet,
    ) -> Result<Vec<ScheduleRecord>> {
        let conn = self.lock()?;
        let quiz_type = partition.quiz_type.name();
        select_in_target(
            &conn,
            "SELECT question, box_level, due_date, last_reviewed, review_count
             FROM questions
             WHERE lexicon = ?1 AND quiz_type = ?2",
            &[&partition.lexicon as &dyn ToSql, &quiz_type],
            target,
            record_from_row,
        )
    }

    fn bulk_set_due_date(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        due_date: NaiveDate,
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE questions SET due_date = ?1
                 WHERE lexicon = ?2 AND quiz_type = ?3 AND question = ?4",
            )?;
            for question in question_ids {
                updated += stmt.execute(params![
                    due_date,
                    partition.lexicon,
                    partition.quiz_type.name(),
                    question
                ])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn bulk_shift_due_date(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        days: i64,
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut select = tx.prepare(
                "SELECT due_date FROM questions
                 WHERE lexicon = ?1 AND quiz_type = ?2 AND question = ?3",
            )?;
            let mut update = tx.prepare(
                "UPDATE questions SET due_date = ?1
                 WHERE lexicon = ?2 AND quiz_type = ?3 AND question = ?4",
            )?;
            for question in question_ids {
                let due: Option<NaiveDate> = select
                    .query_row(
                        params![partition.lexicon, partition.quiz_type.name(), question],
                        |row| row.get(0),
                    )
                    .optional()?;
                // Missing questions are skipped
                let Some(due) = due else { continue };

                updated += update.execute(params![
                    shift_date(due, days)?,
                    partition.lexicon,
                    partition.quiz_type.name(),
                    question
                ])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn bulk_recompute_from_box_level(
        &self,
        partition: &QuizPartition,
        question_ids: &[String],
        policy: &CardboxPolicy,
        reference: NaiveDate,
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut select = tx.prepare(
                "SELECT box_level FROM questions
                 WHERE lexicon = ?1 AND quiz_type = ?2 AND question = ?3",
            )?;
            let mut update = tx.prepare(
                "UPDATE questions SET due_date = ?1
                 WHERE lexicon = ?2 AND quiz_type = ?3 AND question = ?4",
            )?;
            for question in question_ids {
                let level: Option<u32> = select
                    .query_row(
                        params![partition.lexicon, partition.quiz_type.name(), question],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(level) = level else { continue };

                let due = shift_date(reference, i64::from(policy.interval_days(level)))?;
                updated += update.execute(params![
                    due,
                    partition.lexicon,
                    partition.quiz_type.name(),
                    question
                ])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn box_level_counts(&self, partition: &QuizPartition) -> Result<BTreeMap<u32, usize>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT box_level, COUNT(*) FROM questions
             WHERE lexicon = ?1 AND quiz_type = ?2
             GROUP BY box_level",
        )?;

        let counts = stmt
            .query_map(
                params![partition.lexicon, partition.quiz_type.name()],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as usize)),
            )?
            .collect::<rusqlite::Result<BTreeMap<u32, usize>>>()?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuizType;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn partition() -> QuizPartition {
        QuizPartition::new("CSW21", QuizType::Anagrams)
    }

    fn record(id: &str, level: u32, due: NaiveDate) -> ScheduleRecord {
        ScheduleRecord {
            question_id: id.to_string(),
            box_level: level,
            due_date: due,
            last_reviewed: None,
            review_count: 0,
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        init_database(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_schema_mismatch_is_store_unavailable() {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        conn.execute(
            "UPDATE app_state SET value = '99' WHERE key = 'schema_version'",
            (),
        )
        .unwrap();

        let err = init_database(&conn).unwrap_err();
        assert!(matches!(err, CardboxError::StoreUnavailable(_)));
    }

    #[test]
    fn test_upsert_and_get() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let mut rec = record("AERST", 2, day(3));
        store.upsert(&partition(), &rec).unwrap();
        assert_eq!(store.get(&partition(), "AERST").unwrap(), Some(rec.clone()));

        rec.box_level = 3;
        rec.last_reviewed = Some(day(3));
        rec.review_count = 4;
        store.upsert(&partition(), &rec).unwrap();
        assert_eq!(store.get(&partition(), "AERST").unwrap(), Some(rec));
        assert_eq!(store.get(&partition(), "MISSING").unwrap(), None);
    }

    #[test]
    fn test_partitions_are_isolated() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("AERST", 1, day(1))).unwrap();

        let other = QuizPartition::new("TWL06", QuizType::Anagrams);
        assert_eq!(store.get(&other, "AERST").unwrap(), None);
        let hooks = QuizPartition::new("CSW21", QuizType::Hooks);
        assert!(store.records(&hooks, &TargetSet::All).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_rejects_box_zero() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let err = store.upsert(&partition(), &record("A", 0, day(1))).unwrap_err();
        assert!(matches!(err, CardboxError::InvalidRecord { .. }));
    }

    #[test]
    fn test_query_due_with_filter() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("A", 1, day(1))).unwrap();
        store.upsert(&partition(), &record("B", 1, day(5))).unwrap();
        store.upsert(&partition(), &record("C", 1, day(10))).unwrap();

        let due = store
            .query_due_on_or_before(&partition(), day(5), &TargetSet::All)
            .unwrap();
        assert_eq!(due, BTreeSet::from(["A".to_string(), "B".to_string()]));

        let filtered = store
            .query_due_on_or_before(&partition(), day(5), &TargetSet::from_ids(["B", "C", "Z"]))
            .unwrap();
        assert_eq!(filtered, BTreeSet::from(["B".to_string()]));
    }

    #[test]
    fn test_update_with_can_skip_write() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let result = store
            .update_with(&partition(), "A", &mut |_| None)
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(store.get(&partition(), "A").unwrap(), None);

        let written = store
            .update_with(&partition(), "A", &mut |current| {
                assert!(current.is_none());
                Some(record("A", 2, day(7)))
            })
            .unwrap();
        assert_eq!(written, Some(record("A", 2, day(7))));
    }

    #[test]
    fn test_bulk_set_skips_missing() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("A", 1, day(1))).unwrap();
        store.upsert(&partition(), &record("B", 1, day(2))).unwrap();

        let updated = store
            .bulk_set_due_date(&partition(), &ids(&["A", "B", "NOPE"]), day(20))
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(store.get(&partition(), "B").unwrap().unwrap().due_date, day(20));
    }

    #[test]
    fn test_bulk_shift_both_directions() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("A", 1, day(10))).unwrap();

        assert_eq!(store.bulk_shift_due_date(&partition(), &ids(&["A", "X"]), 5).unwrap(), 1);
        assert_eq!(store.get(&partition(), "A").unwrap().unwrap().due_date, day(15));

        store.bulk_shift_due_date(&partition(), &ids(&["A"]), -12).unwrap();
        assert_eq!(store.get(&partition(), "A").unwrap().unwrap().due_date, day(3));
    }

    #[test]
    fn test_bulk_shift_is_atomic_on_failure() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("A", 1, day(10))).unwrap();
        let last_day = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        store.upsert(&partition(), &record("B", 1, last_day)).unwrap();

        assert!(store.bulk_shift_due_date(&partition(), &ids(&["A", "B"]), 1).is_err());
        assert_eq!(store.get(&partition(), "A").unwrap().unwrap().due_date, day(10));
    }

    #[test]
    fn test_upsert_rejects_dates_past_year_9999() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let far = NaiveDate::from_ymd_opt(10238, 6, 1).unwrap();
        let err = store.upsert(&partition(), &record("A", 1, far)).unwrap_err();
        assert!(matches!(err, CardboxError::InvalidRecord { .. }));
    }

    #[test]
    fn test_huge_shift_keeps_backlog_consistent() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("A", 1, day(10))).unwrap();

        assert!(store.bulk_shift_due_date(&partition(), &ids(&["A"]), 3_000_000).is_err());
        let due = store
            .query_due_on_or_before(&partition(), day(10), &TargetSet::All)
            .unwrap();
        assert_eq!(due, BTreeSet::from(["A".to_string()]));
    }

    #[test]
    fn test_upsert_all_is_atomic() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let batch = [record("A", 2, day(4)), record("B", 0, day(4))];

        assert!(store.upsert_all(&partition(), &batch).is_err());
        assert_eq!(store.get(&partition(), "A").unwrap(), None);

        let written = store
            .upsert_all(&partition(), &[record("A", 2, day(4)), record("B", 1, day(6))])
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.records(&partition(), &TargetSet::All).unwrap().len(), 2);
    }

    #[test]
    fn test_records_for_large_explicit_target() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        let stored: Vec<ScheduleRecord> = (0..1200)
            .map(|i| record(&format!("Q{i:04}"), 1, day(1 + (i % 20) as u32)))
            .collect();
        store.upsert_all(&partition(), &stored).unwrap();

        // Every other stored id plus some unknown ones, spanning several chunks
        let wanted: Vec<String> = (0..1300).step_by(2).map(|i| format!("Q{i:04}")).collect();
        let target = TargetSet::from_ids(wanted.iter().map(String::as_str));

        let records = store.records(&partition(), &target).unwrap();
        assert_eq!(records.len(), 600);
        assert!(records.windows(2).all(|w| w[0].question_id < w[1].question_id));
        assert_eq!(records[0].question_id, "Q0000");
        assert_eq!(records[599].question_id, "Q1198");

        let due = store
            .query_due_on_or_before(&partition(), day(1), &target)
            .unwrap();
        // Ids divisible by 20 are due on day 1
        assert_eq!(due.len(), 60);
    }

    #[test]
    fn test_bulk_recompute_from_box_level() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("A", 1, day(30))).unwrap();
        store.upsert(&partition(), &record("B", 2, day(1))).unwrap();
        let policy = CardboxPolicy::new(vec![1, 3]).unwrap();

        let updated = store
            .bulk_recompute_from_box_level(&partition(), &ids(&["A", "B", "C"]), &policy, day(10))
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(store.get(&partition(), "A").unwrap().unwrap().due_date, day(11));
        assert_eq!(store.get(&partition(), "B").unwrap().unwrap().due_date, day(13));
    }

    #[test]
    fn test_box_level_counts() {
        let store = SqliteCardboxStore::open_in_memory().unwrap();
        store.upsert(&partition(), &record("A", 1, day(1))).unwrap();
        store.upsert(&partition(), &record("B", 1, day(1))).unwrap();
        store.upsert(&partition(), &record("C", 4, day(1))).unwrap();

        let counts = store.box_level_counts(&partition()).unwrap();
        assert_eq!(counts, BTreeMap::from([(1, 2), (4, 1)]));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardbox.sqlite3");

        {
            let store = SqliteCardboxStore::open(&path).unwrap();
            store.upsert(&partition(), &record("A", 3, day(9))).unwrap();
        }

        let reopened = SqliteCardboxStore::open(&path).unwrap();
        assert_eq!(reopened.get(&partition(), "A").unwrap().unwrap().box_level, 3);
    }
}
