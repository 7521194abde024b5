use thiserror;

/// Rejections raised before any stored state is touched.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("user id is required")]
    MissingUserId,
    #[error("unknown difficulty '{value}', expected easy, medium or hard")]
    UnknownDifficulty { value: String },
    #[error("topic name must not be empty")]
    EmptyTopicName,
    #[error("topic '{topic}' requires a question total")]
    MissingTopicTotal { topic: String },
    #[error("question total supplied without a topic name")]
    TopicTotalWithoutTopic,
    #[error("'{value}' is not a YYYY-MM-DD date key")]
    InvalidDateKey { value: String },
    #[error("job name is required")]
    MissingJobName,
    #[error("utc offset of {minutes} minutes is out of range")]
    InvalidUtcOffset { minutes: i32 },
}
