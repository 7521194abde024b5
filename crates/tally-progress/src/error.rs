use tally_types::UserId;

/// Describes a specific progress-record invariant violation.
///
/// Split in two groups: shape checks that hold for any single record, and
/// transition checks that compare a record with the version it was derived
/// from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordViolation {
    /// `total_solved` must equal `easy + medium + hard`.
    TotalMismatch { total_solved: u32, difficulty_sum: u64 },
    /// A topic's `solved_count` exceeds its `total_questions`.
    TopicOverflow {
        topic_name: String,
        solved_count: u32,
        total_questions: u32,
    },
    /// Two topic entries share a name.
    DuplicateTopic { topic_name: String },
    /// The record's owner changed between load and write.
    UserChanged { expected: UserId, actual: UserId },
    /// A previously credited key is missing after the update.
    SolvedKeyRemoved { key: String },
    /// A difficulty counter or the streak went down without a reset.
    CounterRegressed {
        counter: &'static str,
        before: u32,
        after: u32,
    },
    /// A topic entry present before the update disappeared.
    TopicRemoved { topic_name: String },
    /// `last_visited` moved backwards.
    VisitRegressed,
}

impl std::fmt::Display for RecordViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalMismatch {
                total_solved,
                difficulty_sum,
            } => write!(
                f,
                "total_solved is {total_solved} but difficulty counters sum to {difficulty_sum}"
            ),
            Self::TopicOverflow {
                topic_name,
                solved_count,
                total_questions,
            } => write!(
                f,
                "topic '{topic_name}' has {solved_count} solved out of {total_questions}"
            ),
            Self::DuplicateTopic { topic_name } => {
                write!(f, "topic '{topic_name}' appears more than once")
            }
            Self::UserChanged { expected, actual } => {
                write!(f, "record owner changed from {expected} to {actual}")
            }
            Self::SolvedKeyRemoved { key } => {
                write!(f, "solved key '{key}' was removed from the ledger")
            }
            Self::CounterRegressed {
                counter,
                before,
                after,
            } => write!(f, "{counter} regressed from {before} to {after}"),
            Self::TopicRemoved { topic_name } => {
                write!(f, "topic '{topic_name}' was removed")
            }
            Self::VisitRegressed => write!(f, "last_visited moved backwards"),
        }
    }
}

/// Errors produced by progress-record operations.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("event for {event_user} applied to record of {record_user}")]
    WrongRecord { event_user: UserId, record_user: UserId },
    #[error("invariant violation: {0}")]
    InvariantViolation(RecordViolation),
}
