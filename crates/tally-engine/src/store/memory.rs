use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use tally_types::{BadgeSet, DateKey, JobName, JobRunRecord, ProgressRecord, UserId};
use tokio::sync::Mutex;

use super::{BadgeStore, InsertOutcome, JobRunLedger, ProgressStore, Versioned, WriteOutcome};
use crate::error::StoreError;

/// Process-local backend. Each map sits behind its own lock, and every
/// conditional write checks and mutates under that lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    progress: Mutex<HashMap<UserId, Versioned<ProgressRecord>>>,
    badges: Mutex<HashMap<UserId, BadgeSet>>,
    runs: Mutex<HashMap<(JobName, DateKey), JobRunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<ProgressRecord>>, StoreError> {
        Ok(self.progress.lock().await.get(user_id).cloned())
    }

    async fn insert(&self, record: &ProgressRecord) -> Result<WriteOutcome, StoreError> {
        let mut progress = self.progress.lock().await;
        match progress.entry(record.user_id.clone()) {
            Entry::Occupied(_) => Ok(WriteOutcome::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(Versioned {
                    version: 1,
                    value: record.clone(),
                });
                Ok(WriteOutcome::Written { version: 1 })
            }
        }
    }

    async fn replace(
        &self,
        record: &ProgressRecord,
        expected_version: u64,
    ) -> Result<WriteOutcome, StoreError> {
        let mut progress = self.progress.lock().await;
        match progress.get_mut(&record.user_id) {
            Some(stored) if stored.version == expected_version => {
                stored.version += 1;
                stored.value = record.clone();
                Ok(WriteOutcome::Written {
                    version: stored.version,
                })
            }
            _ => Ok(WriteOutcome::Conflict),
        }
    }
}

#[async_trait]
impl BadgeStore for MemoryStore {
    async fn badges(&self, user_id: &UserId) -> Result<Option<BadgeSet>, StoreError> {
        Ok(self.badges.lock().await.get(user_id).cloned())
    }

    async fn award_badges(
        &self,
        user_id: &UserId,
        awarded: &BadgeSet,
    ) -> Result<BadgeSet, StoreError> {
        let mut badges = self.badges.lock().await;
        let held = badges.entry(user_id.clone()).or_default();
        held.merge(awarded);
        Ok(held.clone())
    }
}

#[async_trait]
impl JobRunLedger for MemoryStore {
    async fn insert_run(&self, run: &JobRunRecord) -> Result<InsertOutcome, StoreError> {
        let mut runs = self.runs.lock().await;
        match runs.entry((run.job_name.clone(), run.date_key.clone())) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(run.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn find_run(
        &self,
        job_name: &JobName,
        date_key: &DateKey,
    ) -> Result<Option<JobRunRecord>, StoreError> {
        Ok(self
            .runs
            .lock()
            .await
            .get(&(job_name.clone(), date_key.clone()))
            .cloned())
    }
}
