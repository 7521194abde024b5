use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_progress::{FoldReport, fold_activity};
use tally_types::{ActivityEvent, BadgeSet, ProgressRecord, RawActivity, ReferenceZone, UserId};
use tracing::{debug, info, instrument, warn};

use crate::collaborators::BadgeAwarder;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::store::{BadgeStore, ProgressStore, Versioned, WriteOutcome, bounded};

/// Badge half of an activity result. Reported separately because the
/// progress write is already durable when badges are evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BadgeOutcome {
    Awarded { badges: BadgeSet },
    Failed { reason: String },
}

/// What a successful activity call returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    pub progress: ProgressRecord,
    /// Storage version the snapshot was written at.
    pub version: u64,
    pub report: FoldReport,
    pub badges: BadgeOutcome,
}

/// Folds activity events into stored progress records.
///
/// Each call loads the user's record, folds the event into a copy, and
/// writes it back conditionally on the version it loaded. A concurrent
/// writer for the same user turns the write into a conflict, after which
/// the call reloads and folds again. Folding the same event twice is
/// harmless: the solved-key ledger credits a key once and same-day visits
/// leave the streak alone.
pub struct AggregationCoordinator {
    progress: Arc<dyn ProgressStore>,
    badges: Arc<dyn BadgeStore>,
    awarder: Arc<dyn BadgeAwarder>,
    zone: ReferenceZone,
    storage_timeout: Duration,
    collaborator_timeout: Duration,
    max_write_attempts: u32,
}

impl AggregationCoordinator {
    pub fn new(
        config: &EngineConfig,
        progress: Arc<dyn ProgressStore>,
        badges: Arc<dyn BadgeStore>,
        awarder: Arc<dyn BadgeAwarder>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            progress,
            badges,
            awarder,
            zone: config.zone()?,
            storage_timeout: config.storage_timeout(),
            collaborator_timeout: config.collaborator_timeout(),
            max_write_attempts: config.write_attempts(),
        })
    }

    /// Validate a wire-shaped report and apply it at the current time.
    pub async fn apply_raw(&self, raw: RawActivity) -> Result<ActivityOutcome, EngineError> {
        let event = ActivityEvent::try_from(raw)?;
        self.apply_activity(event).await
    }

    pub async fn apply_activity(
        &self,
        event: ActivityEvent,
    ) -> Result<ActivityOutcome, EngineError> {
        self.apply_activity_at(event, Utc::now()).await
    }

    /// Apply `event` as if it happened at `now`.
    #[instrument(skip_all, fields(user_id = %event.user_id))]
    pub async fn apply_activity_at(
        &self,
        event: ActivityEvent,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome, EngineError> {
        let (stored, report) = self.persist(&event, now).await?;
        info!(
            version = stored.version,
            streak = stored.value.streak_count,
            total_solved = stored.value.total_solved,
            credit = ?report.credit,
            "progress updated"
        );

        let badges = self.award(&stored.value).await;

        Ok(ActivityOutcome {
            progress: stored.value,
            version: stored.version,
            report,
            badges,
        })
    }

    /// Current snapshot for `user_id`, or `None` if the user never reported
    /// activity.
    pub async fn progress(&self, user_id: &UserId) -> Result<Option<ProgressRecord>, EngineError> {
        let loaded =
            bounded("load progress", self.storage_timeout, self.progress.load(user_id)).await?;
        Ok(loaded.map(|stored| stored.value))
    }

    async fn persist(
        &self,
        event: &ActivityEvent,
        now: DateTime<Utc>,
    ) -> Result<(Versioned<ProgressRecord>, FoldReport), EngineError> {
        for attempt in 1..=self.max_write_attempts {
            let loaded = bounded(
                "load progress",
                self.storage_timeout,
                self.progress.load(&event.user_id),
            )
            .await?;

            let (current, expected_version) = match loaded {
                Some(stored) => (stored.value, Some(stored.version)),
                None => (ProgressRecord::new(event.user_id.clone()), None),
            };

            let (next, report) = fold_activity(&current, event, now, self.zone)?;

            let outcome = match expected_version {
                None => {
                    bounded("insert progress", self.storage_timeout, self.progress.insert(&next))
                        .await?
                }
                Some(version) => {
                    bounded(
                        "replace progress",
                        self.storage_timeout,
                        self.progress.replace(&next, version),
                    )
                    .await?
                }
            };

            match outcome {
                WriteOutcome::Written { version } => {
                    return Ok((
                        Versioned {
                            version,
                            value: next,
                        },
                        report,
                    ));
                }
                WriteOutcome::Conflict => {
                    debug!(attempt, ?expected_version, "progress write lost a race, reloading");
                }
            }
        }

        warn!(attempts = self.max_write_attempts, "giving up on contended progress record");
        Err(EngineError::Contention {
            user_id: event.user_id.clone(),
            attempts: self.max_write_attempts,
        })
    }

    async fn award(&self, progress: &ProgressRecord) -> BadgeOutcome {
        let current = match bounded(
            "load badges",
            self.storage_timeout,
            self.badges.badges(&progress.user_id),
        )
        .await
        {
            Ok(found) => found.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "could not load current badges");
                return BadgeOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let evaluated = tokio::time::timeout(
            self.collaborator_timeout,
            self.awarder.evaluate(progress, &current),
        )
        .await;

        match evaluated {
            Ok(Ok(mut badges)) => {
                if !current.is_subset(&badges) {
                    warn!("badge awarder dropped held badges, keeping them");
                }
                badges.merge(&current);
                BadgeOutcome::Awarded { badges }
            }
            Ok(Err(err)) => {
                warn!(error = %err, "badge evaluation failed");
                BadgeOutcome::Failed {
                    reason: err.to_string(),
                }
            }
            Err(_) => {
                warn!(after = ?self.collaborator_timeout, "badge evaluation timed out");
                BadgeOutcome::Failed {
                    reason: format!(
                        "badge evaluation timed out after {:?}",
                        self.collaborator_timeout
                    ),
                }
            }
        }
    }
}
