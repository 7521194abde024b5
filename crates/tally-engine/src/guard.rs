use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tally_types::{DateKey, JobName, JobRunRecord, ReferenceZone};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::store::{InsertOutcome, JobRunLedger, bounded};

/// Result of trying to claim a job for a calendar day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller won the claim and should run the job.
    Claimed(JobRunRecord),
    /// Another caller already claimed this job for the day.
    AlreadyClaimed { job_name: JobName, date_key: DateKey },
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// At-most-once-per-day execution guard.
///
/// The claim is a single conditional insert keyed by `(job_name, date_key)`,
/// so two concurrent callers can never both observe `Claimed`. A claim is
/// never released: if the job fails after claiming, it is not rerun that day.
pub struct DailyJobGuard {
    ledger: Arc<dyn JobRunLedger>,
    zone: ReferenceZone,
    storage_timeout: Duration,
}

impl DailyJobGuard {
    pub fn new(config: &EngineConfig, ledger: Arc<dyn JobRunLedger>) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            ledger,
            zone: config.zone()?,
            storage_timeout: config.storage_timeout(),
        })
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }

    #[tracing::instrument(skip(self))]
    pub async fn try_claim(
        &self,
        job_name: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, EngineError> {
        let job_name = JobName::new(job_name)?;
        let date_key = DateKey::for_instant(now, self.zone);
        let run = JobRunRecord {
            job_name,
            date_key,
            claimed_at: now,
        };

        let inserted =
            bounded("insert job run", self.storage_timeout, self.ledger.insert_run(&run)).await?;

        match inserted {
            InsertOutcome::Inserted => {
                info!(date_key = %run.date_key, "job claimed");
                Ok(ClaimOutcome::Claimed(run))
            }
            InsertOutcome::Duplicate => {
                debug!(date_key = %run.date_key, "job already claimed for the day");
                Ok(ClaimOutcome::AlreadyClaimed {
                    job_name: run.job_name,
                    date_key: run.date_key,
                })
            }
        }
    }

    /// Existing claim for `job_name` on `date_key`, if any.
    pub async fn find_claim(
        &self,
        job_name: &JobName,
        date_key: &DateKey,
    ) -> Result<Option<JobRunRecord>, EngineError> {
        bounded(
            "find job run",
            self.storage_timeout,
            self.ledger.find_run(job_name, date_key),
        )
        .await
    }
}
