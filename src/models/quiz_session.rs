//! Quiz session bookkeeping.
//! Collects one response per question and hands them to the cardbox
//! scheduler when the quiz is over.

use super::{QuizPartition, QuizResponse, ResponseOutcome};
use crate::database::CardboxStore;
use crate::error::Result;
use crate::scheduler::ResponseProcessor;
use chrono::NaiveDate;
use log::info;

pub struct QuizSession {
    pub partition: QuizPartition,
    pub responses: Vec<QuizResponse>,
}

impl QuizSession {
    pub fn new<I, S>(partition: QuizPartition, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responses = questions
            .into_iter()
            .enumerate()
            .map(|(idx, name)| QuizResponse::new(idx, name))
            .collect();

        Self {
            partition,
            responses,
        }
    }

    /// Records the outcome for question `index`. Returns false for an unknown index.
    pub fn mark(&mut self, index: usize, outcome: ResponseOutcome) -> bool {
        match self.responses.get_mut(index) {
            Some(response) => {
                response.outcome = outcome;
                true
            }
            None => false,
        }
    }

    /// Marks every still-unanswered question as missed.
    pub fn finish(&mut self) {
        for response in &mut self.responses {
            if !response.is_complete() {
                response.outcome = ResponseOutcome::Missed;
            }
        }
    }

    pub fn count(&self, outcome: ResponseOutcome) -> usize {
        self.responses.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn total_count(&self) -> usize {
        self.responses.len()
    }

    pub fn is_completed(&self) -> bool {
        self.responses.iter().all(QuizResponse::is_complete)
    }

    /// Applies every response to the store. Returns the number of records written.
    pub fn commit(
        &self,
        store: &dyn CardboxStore,
        processor: &ResponseProcessor,
        today: NaiveDate,
    ) -> Result<usize> {
        let mut written = 0;
        for response in &self.responses {
            if !response.is_complete() {
                continue;
            }
            processor.apply(store, &self.partition, &response.name, response.outcome, today)?;
            written += 1;
        }

        info!(
            "{}: quiz committed, {} correct, {} missed, {} incorrect, {} incomplete",
            self.partition,
            self.count(ResponseOutcome::Correct),
            self.count(ResponseOutcome::Missed),
            self.count(ResponseOutcome::Incorrect),
            self.count(ResponseOutcome::Incomplete)
        );
        Ok(written)
    }
}
