//! Async side of tally: durable stores, the activity coordinator, and the
//! once-per-day job guard.
//!
//! The coordinator loads a user's [`ProgressRecord`](tally_types::ProgressRecord),
//! folds an event into it with [`tally_progress::fold_activity`], and writes
//! it back with an optimistic version check. The guard and the broadcast
//! runner share a [`JobRunLedger`] whose `(job_name, date_key)` key admits
//! one claim per reference day.

pub mod broadcast;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod store;

pub use broadcast::{BroadcastReport, PotdBroadcast};
pub use collaborators::{
    BadgeAwarder, Mailer, PotdMessage, Problem, ProblemOfTheDay, SubscriberDirectory,
};
pub use config::EngineConfig;
pub use coordinator::{ActivityOutcome, AggregationCoordinator, BadgeOutcome};
pub use error::{CollaboratorError, ConfigError, EngineError, StoreError};
pub use guard::{ClaimOutcome, DailyJobGuard};
pub use store::{
    BadgeStore, InsertOutcome, JobRunLedger, MemoryStore, ProgressStore, SqliteStore, Versioned,
    WriteOutcome,
};
