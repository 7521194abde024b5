pub mod activity;
pub mod badge;
pub mod error;
pub mod job_run;
pub mod progress;
pub mod user_id;

pub use activity::{ActivityEvent, Difficulty, RawActivity, TopicReport};
pub use badge::BadgeSet;
pub use error::ValidationError;
pub use job_run::{DEFAULT_UTC_OFFSET_MINUTES, DateKey, JobName, JobRunRecord, ReferenceZone};
pub use progress::{ProgressRecord, TopicProgress};
pub use user_id::UserId;
