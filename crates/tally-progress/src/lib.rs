//! Pure folding of activity events into a per-user progress record.
//!
//! Nothing here touches storage: [`fold_activity`] takes the current record
//! and returns the next one, already checked against the record invariants.

pub mod counters;
pub mod error;
pub mod fold;
pub mod invariants;
pub mod ledger;
pub mod streak;

pub use counters::TopicChange;
pub use error::{ProgressError, RecordViolation};
pub use fold::{FoldReport, fold_activity, is_visit_only};
pub use invariants::{check_transition, validate_record};
pub use ledger::SolveCredit;
pub use streak::{StreakTransition, evaluate_streak};
