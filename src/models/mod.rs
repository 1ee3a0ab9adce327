pub mod policy;
pub mod quiz_response;
pub mod quiz_session;
pub mod quiz_type;
pub mod schedule_record;
pub mod target;

pub use policy::CardboxPolicy;
pub use quiz_response::{QuizResponse, ResponseOutcome};
pub use quiz_session::QuizSession;
pub use quiz_type::{QuizPartition, QuizType};
pub use schedule_record::ScheduleRecord;
pub use target::TargetSet;
