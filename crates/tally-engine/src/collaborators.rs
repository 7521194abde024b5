//! Contracts for the services the engine calls but does not own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_types::{BadgeSet, DateKey, Difficulty, ProgressRecord};

use crate::error::CollaboratorError;

/// Badge-catalog rules.
///
/// Implementations must be idempotent (the same snapshot yields the same
/// set) and must treat `current` as a floor. Persisting newly unlocked
/// badges is the implementation's job, typically through
/// [`BadgeStore::award_badges`](crate::store::BadgeStore::award_badges).
#[async_trait]
pub trait BadgeAwarder: Send + Sync {
    async fn evaluate(
        &self,
        progress: &ProgressRecord,
        current: &BadgeSet,
    ) -> Result<BadgeSet, CollaboratorError>;
}

/// A problem featured in the daily broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub title: String,
    pub difficulty: Difficulty,
    /// Platform name to problem URL.
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    #[serde(default)]
    pub solution_link: Option<String>,
}

/// One outgoing "problem of the day" notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PotdMessage {
    pub recipient: String,
    pub date_key: DateKey,
    pub problem: Problem,
}

/// Source of the day's featured problem.
#[async_trait]
pub trait ProblemOfTheDay: Send + Sync {
    async fn problem_for(&self, date_key: &DateKey) -> Result<Problem, CollaboratorError>;
}

/// Addresses of users who opted into the daily email.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn subscribed_recipients(&self) -> Result<Vec<String>, CollaboratorError>;
}

/// Outbound delivery. Rendering and transport are the implementation's
/// concern.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: &PotdMessage) -> Result<(), CollaboratorError>;
}
