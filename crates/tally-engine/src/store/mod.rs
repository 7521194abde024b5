//! Durable state behind the engine.
//!
//! Three narrow contracts, each enforcing its own uniqueness rule in the
//! backend rather than in callers:
//! - [`ProgressStore`]: one versioned record per user. Writes are
//!   conditional (insert-if-absent, replace-if-version-matches), so a lost
//!   race comes back as [`WriteOutcome::Conflict`] instead of silently
//!   overwriting a concurrent update.
//! - [`BadgeStore`]: per-user badge sets, written by the badge collaborator.
//! - [`JobRunLedger`]: `(job_name, date_key)` claims. A duplicate insert is
//!   [`InsertOutcome::Duplicate`], a normal value.
//!
//! Two backends implement all three: [`MemoryStore`] and [`SqliteStore`].

mod memory;
mod sqlite;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_types::{BadgeSet, DateKey, JobName, JobRunRecord, ProgressRecord, UserId};

use crate::error::{EngineError, StoreError};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored value together with its write version.
///
/// Versions start at 1 on insert and grow by one per successful write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Result of a conditional progress write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { version: u64 },
    /// The stored state no longer matches what the caller loaded.
    Conflict,
}

/// Result of a job-run insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A run for the same `(job_name, date_key)` already exists.
    Duplicate,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<ProgressRecord>>, StoreError>;

    /// Store `record` at version 1 unless a record for the user exists.
    async fn insert(&self, record: &ProgressRecord) -> Result<WriteOutcome, StoreError>;

    /// Overwrite the stored record only if its version is still `expected_version`.
    async fn replace(
        &self,
        record: &ProgressRecord,
        expected_version: u64,
    ) -> Result<WriteOutcome, StoreError>;
}

#[async_trait]
pub trait BadgeStore: Send + Sync {
    async fn badges(&self, user_id: &UserId) -> Result<Option<BadgeSet>, StoreError>;

    /// Union `awarded` into the stored set and return the result. Never
    /// removes a badge.
    async fn award_badges(
        &self,
        user_id: &UserId,
        awarded: &BadgeSet,
    ) -> Result<BadgeSet, StoreError>;
}

#[async_trait]
pub trait JobRunLedger: Send + Sync {
    /// Atomically insert `run` unless its `(job_name, date_key)` exists.
    async fn insert_run(&self, run: &JobRunRecord) -> Result<InsertOutcome, StoreError>;

    async fn find_run(
        &self,
        job_name: &JobName,
        date_key: &DateKey,
    ) -> Result<Option<JobRunRecord>, StoreError>;
}

/// Run a storage call under `limit`, mapping an elapsed deadline to
/// [`EngineError::Timeout`].
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(EngineError::from),
        Err(_) => Err(EngineError::Timeout {
            operation,
            after: limit,
        }),
    }
}
