pub mod backlog;
pub mod reschedule;
pub mod response;
pub mod task;

pub use backlog::BacklogEngine;
pub use reschedule::{
    DEFAULT_BATCH_SIZE, RescheduleControl, RescheduleEngine, RescheduleMode, RescheduleOutcome,
    RescheduleStrategy,
};
pub use response::ResponseProcessor;
pub use task::{RescheduleRequest, RescheduleTask, spawn_reschedule};
