//! Runs a reschedule on a worker thread so interactive callers stay responsive.
use super::reschedule::{
    RescheduleControl, RescheduleEngine, RescheduleOutcome, RescheduleStrategy,
};
use crate::database::CardboxStore;
use crate::error::{CardboxError, Result};
use crate::models::{CardboxPolicy, QuizPartition, TargetSet};
use chrono::NaiveDate;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct RescheduleRequest {
    pub partition: QuizPartition,
    pub target: TargetSet,
    pub strategy: RescheduleStrategy,
    pub today: NaiveDate,
}

pub struct RescheduleTask {
    control: RescheduleControl,
    handle: JoinHandle<Result<RescheduleOutcome>>,
}

impl RescheduleTask {
    /// Questions handled so far.
    pub fn progress(&self) -> usize {
        self.control.processed()
    }

    /// Asks the worker to stop at the next batch boundary.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// A handle that can cancel the task from another thread, e.g. a signal handler.
    pub fn control(&self) -> RescheduleControl {
        self.control.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<RescheduleOutcome> {
        self.handle.join().map_err(|_| {
            CardboxError::StoreUnavailable("reschedule worker panicked".to_string())
        })?
    }
}

pub fn spawn_reschedule(
    store: Arc<dyn CardboxStore>,
    policy: CardboxPolicy,
    batch_size: usize,
    request: RescheduleRequest,
) -> RescheduleTask {
    let control = RescheduleControl::new();
    let worker_control = control.clone();

    let handle = thread::spawn(move || {
        RescheduleEngine::new(store.as_ref(), &policy, batch_size).reschedule(
            &request.partition,
            &request.target,
            request.strategy,
            request.today,
            &worker_control,
        )
    });

    RescheduleTask { control, handle }
}
