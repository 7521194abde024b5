use crate::error::ValidationError;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// UTC offset of Asia/Kolkata, which observes no daylight saving.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 5 * 60 + 30;

/// Fixed time zone every calendar-day decision is made in.
///
/// Streak arithmetic and job-run date keys share this zone, so "today" means
/// the same thing to both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceZone(FixedOffset);

impl ReferenceZone {
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ValidationError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self)
            .ok_or(ValidationError::InvalidUtcOffset { minutes })
    }

    pub fn utc() -> Self {
        Self(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.0
    }

    /// Calendar date of `instant` as seen from this zone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    /// Whole calendar days from `earlier` to `later`. Negative when `later`
    /// falls on an earlier calendar date.
    pub fn days_between(&self, earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
        (self.date_of(later) - self.date_of(earlier)).num_days()
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES).unwrap_or_else(|_| Self::utc())
    }
}

/// Calendar-day key in `YYYY-MM-DD` form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
    pub fn for_instant(instant: DateTime<Utc>, zone: ReferenceZone) -> Self {
        Self::from_date(zone.date_of(instant))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    /// Parse a stored or user-supplied key, normalizing it to `YYYY-MM-DD`.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|_| ValidationError::InvalidDateKey {
                value: value.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a scheduled batch job, e.g. `send-potd`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobName(String);

impl JobName {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::MissingJobName);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof that a job was claimed for one calendar day.
///
/// `(job_name, date_key)` is unique in storage. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunRecord {
    pub job_name: JobName,
    pub date_key: DateKey,
    pub claimed_at: DateTime<Utc>,
}
