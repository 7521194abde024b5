use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Badges a user has unlocked. Badges are never revoked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeSet(BTreeSet<String>);

impl BadgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, badge: &str) -> bool {
        self.0.contains(badge)
    }

    /// Returns `true` when the badge was not held before.
    pub fn award(&mut self, badge: impl Into<String>) -> bool {
        self.0.insert(badge.into())
    }

    /// Union with `other`, keeping every badge already held.
    pub fn merge(&mut self, other: &BadgeSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Whether every badge in `self` is also in `other`.
    pub fn is_subset(&self, other: &BadgeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for BadgeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
