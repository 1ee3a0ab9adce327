//! Application state shared by the CLI commands.
//! Validates user input, opens the store and forwards to the scheduling core.

use anyhow::{Context, Result};
use cardbox_app::database::{CardboxStore, SqliteCardboxStore};
use cardbox_app::export::{export_json_to_path, import_snapshot, read_snapshot};
use cardbox_app::scheduler::{
    BacklogEngine, RescheduleMode, RescheduleOutcome, RescheduleRequest, RescheduleStrategy,
    RescheduleTask, ResponseProcessor, spawn_reschedule,
};
use cardbox_app::search::{QuestionResolver, SearchSpec, WordListResolver};
use cardbox_app::{CardboxConfig, QuizPartition, QuizSession, ResponseOutcome, TargetSet};
use chrono::NaiveDate;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub struct App {
    pub config: CardboxConfig,
    store: Arc<dyn CardboxStore>,
    processor: ResponseProcessor,
    resolver: WordListResolver,
}

/// What a reschedule request turned into.
pub enum RescheduleStart {
    Running(RescheduleTask),
    /// The search matched no questions, so there is nothing to do.
    NothingSelected,
}

impl App {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = CardboxConfig::load_or_default(config_path).context("Failed to load config")?;
        let store = SqliteCardboxStore::open(&config.database_path).with_context(|| {
            format!(
                "Failed to open cardbox database '{}'",
                config.database_path.display()
            )
        })?;

        Ok(Self {
            processor: ResponseProcessor::new(config.policy().clone()),
            config,
            store: Arc::new(store),
            resolver: WordListResolver,
        })
    }

    fn partition(&self, lexicon: &str, quiz_type: &str) -> Result<QuizPartition> {
        Ok(self.config.partition(lexicon, quiz_type)?)
    }

    /// Records a finished quiz. Returns how many schedules were written.
    pub fn apply_responses(
        &self,
        lexicon: &str,
        quiz_type: &str,
        responses: &[(String, ResponseOutcome)],
        today: NaiveDate,
    ) -> Result<usize> {
        let partition = self.partition(lexicon, quiz_type)?;
        let mut session = QuizSession::new(partition, responses.iter().map(|(q, _)| q.clone()));
        for (idx, (_, outcome)) in responses.iter().enumerate() {
            session.mark(idx, *outcome);
        }

        let written = session
            .commit(self.store.as_ref(), &self.processor, today)
            .context("Failed to record quiz responses")?;
        Ok(written)
    }

    pub fn backlog(&self, lexicon: &str, quiz_type: &str, date: NaiveDate) -> Result<usize> {
        let partition = self.partition(lexicon, quiz_type)?;
        let count = BacklogEngine::new(self.store.as_ref())
            .ready_count(&partition, date, &TargetSet::All)
            .context("Failed to count ready questions")?;
        Ok(count)
    }

    pub fn summary(&self, lexicon: &str, quiz_type: &str) -> Result<BTreeMap<u32, usize>> {
        let partition = self.partition(lexicon, quiz_type)?;
        let counts = self
            .store
            .box_level_counts(&partition)
            .context("Failed to read cardbox summary")?;
        Ok(counts)
    }

    /// Validates the request, resolves the target questions and starts the
    /// reschedule on a worker thread.
    pub fn start_reschedule(
        &self,
        lexicon: &str,
        quiz_type: &str,
        search: Option<SearchSpec>,
        mode: RescheduleMode,
        value: Option<i64>,
        today: NaiveDate,
    ) -> Result<RescheduleStart> {
        let partition = self.partition(lexicon, quiz_type)?;
        let strategy = RescheduleStrategy::from_parts(mode, value)?;

        let target = self
            .resolver
            .resolve(&partition.lexicon, partition.quiz_type, search.as_ref())?;
        if target.is_empty_selection() {
            info!("{partition}: search matched no questions, nothing to reschedule");
            return Ok(RescheduleStart::NothingSelected);
        }

        let task = spawn_reschedule(
            Arc::clone(&self.store),
            self.config.policy().clone(),
            self.config.batch_size,
            RescheduleRequest {
                partition,
                target,
                strategy,
                today,
            },
        );
        Ok(RescheduleStart::Running(task))
    }

    pub fn wait(task: RescheduleTask) -> Result<RescheduleOutcome> {
        let outcome = task
            .join()
            .context("Reschedule failed, due dates were left as they were")?;
        Ok(outcome)
    }

    pub fn export(&self, lexicon: &str, quiz_type: &str, path: &Path) -> Result<usize> {
        let partition = self.partition(lexicon, quiz_type)?;
        let count = export_json_to_path(self.store.as_ref(), &partition, path)
            .with_context(|| format!("Failed to export to '{}'", path.display()))?;
        Ok(count)
    }

    pub fn import(&self, path: &Path) -> Result<(QuizPartition, usize)> {
        let snapshot = read_snapshot(path)
            .with_context(|| format!("Failed to read snapshot '{}'", path.display()))?;
        let partition = self.partition(&snapshot.lexicon, snapshot.quiz_type.name())?;

        let count = import_snapshot(self.store.as_ref(), &snapshot)
            .with_context(|| format!("Failed to import '{}'", path.display()))?;
        Ok((partition, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbox_app::ScheduleRecord;
    use std::fs;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 7).unwrap()
    }

    fn app_in(dir: &Path) -> App {
        let config = dir.join("cardbox.toml");
        fs::write(
            &config,
            format!(
                "database_path = '{}'\nlexicons = [\"CSW21\"]\nbatch_size = 2\n",
                dir.join("cardbox.sqlite3").display()
            ),
        )
        .unwrap();
        App::new(Some(&config)).unwrap()
    }

    fn seeded_app(dir: &Path) -> (App, QuizPartition) {
        let app = app_in(dir);
        let partition = app.partition("CSW21", "anagrams").unwrap();
        app.store
            .upsert(&partition, &ScheduleRecord::new("AERST", today()))
            .unwrap();
        (app, partition)
    }

    fn due(app: &App, partition: &QuizPartition) -> NaiveDate {
        app.store.get(partition, "AERST").unwrap().unwrap().due_date
    }

    #[test]
    fn test_empty_search_selects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (app, partition) = seeded_app(dir.path());

        for words in [Vec::new(), vec!["  ".to_string()]] {
            let start = app
                .start_reschedule(
                    "CSW21",
                    "anagrams",
                    Some(SearchSpec::Words(words)),
                    RescheduleMode::ShiftDays,
                    Some(30),
                    today(),
                )
                .unwrap();
            assert!(matches!(start, RescheduleStart::NothingSelected));
        }
        assert_eq!(due(&app, &partition), today());
    }

    #[test]
    fn test_bad_requests_are_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let (app, partition) = seeded_app(dir.path());

        let requests = [
            ("TWL06", "anagrams", RescheduleMode::ShiftDays, Some(3)),
            ("CSW21", "crossword", RescheduleMode::ShiftDays, Some(3)),
            ("CSW21", "anagrams", RescheduleMode::ShiftBacklog, Some(-1)),
            ("CSW21", "anagrams", RescheduleMode::ByCardbox, Some(2)),
            ("CSW21", "anagrams", RescheduleMode::ShiftDays, None),
        ];
        for (lexicon, quiz_type, mode, value) in requests {
            let result = app.start_reschedule(lexicon, quiz_type, None, mode, value, today());
            assert!(result.is_err(), "{lexicon}/{quiz_type} {mode:?} {value:?}");
        }
        assert!(app.backlog("TWL06", "anagrams", today()).is_err());
        assert_eq!(due(&app, &partition), today());
    }

    #[test]
    fn test_reschedule_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());

        let responses = [
            ("AERST".to_string(), ResponseOutcome::Correct),
            ("EINRST".to_string(), ResponseOutcome::Missed),
            ("AEINST".to_string(), ResponseOutcome::Incomplete),
        ];
        let written = app
            .apply_responses("CSW21", "anagrams", &responses, today())
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(app.backlog("CSW21", "anagrams", today()).unwrap(), 0);

        let start = app
            .start_reschedule(
                "CSW21",
                "anagrams",
                None,
                RescheduleMode::ShiftBacklog,
                Some(1),
                today(),
            )
            .unwrap();
        let RescheduleStart::Running(task) = start else {
            panic!("reschedule over every question should run");
        };
        let outcome = App::wait(task).unwrap();

        assert_eq!(outcome, RescheduleOutcome { updated: 2, cancelled: false });
        assert_eq!(app.backlog("CSW21", "anagrams", today()).unwrap(), 1);
        let summary = app.summary("CSW21", "anagrams").unwrap();
        assert_eq!(summary, BTreeMap::from([(1, 1), (2, 1)]));
    }

    #[test]
    fn test_import_checks_lexicon_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let path = dir.path().join("twl.json");
        fs::write(
            &path,
            r#"{"lexicon":"TWL06","quiz_type":"Anagrams","records":[
                {"question_id":"AERST",
                 "box_level":2,"due_date":"2024-10-01","last_reviewed":null,"review_count":1}]}"#,
        )
        .unwrap();

        assert!(app.import(&path).is_err());
        let twl = QuizPartition::new("TWL06", cardbox_app::QuizType::Anagrams);
        assert!(app.store.records(&twl, &TargetSet::All).unwrap().is_empty());
    }
}
