use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{ProgressRecord, ReferenceZone};

/// Outcome of evaluating one activity against the previous visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreakTransition {
    /// No prior visit. Streak becomes 1.
    Started,
    /// Same calendar day as the last visit.
    Unchanged,
    /// Exactly one calendar day after the last visit.
    Extended,
    /// Two or more days since the last visit. Streak becomes 1.
    Reset,
    /// Event dated before the last visit (clock skew or a stale retry).
    /// Neither the streak nor `last_visited` move.
    Stale,
}

/// Classify `now` against `last_visited` in whole calendar days of `zone`.
///
/// Pure: no record is touched. See [`apply_streak`] for the mutation.
pub fn evaluate_streak(
    last_visited: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    zone: ReferenceZone,
) -> StreakTransition {
    let Some(last) = last_visited else {
        return StreakTransition::Started;
    };
    match zone.days_between(last, now) {
        0 => StreakTransition::Unchanged,
        1 => StreakTransition::Extended,
        d if d > 1 => StreakTransition::Reset,
        _ => StreakTransition::Stale,
    }
}

/// Apply the streak rule to `record` and refresh `last_visited`.
///
/// A `Stale` transition leaves both fields untouched; an instant earlier on
/// the same day as `last_visited` is `Unchanged` but also keeps the later
/// timestamp, so `last_visited` never moves backwards.
pub fn apply_streak(
    record: &mut ProgressRecord,
    now: DateTime<Utc>,
    zone: ReferenceZone,
) -> StreakTransition {
    let transition = evaluate_streak(record.last_visited, now, zone);
    match transition {
        StreakTransition::Started | StreakTransition::Reset => record.streak_count = 1,
        StreakTransition::Extended => {
            record.streak_count = record.streak_count.saturating_add(1);
        }
        StreakTransition::Unchanged | StreakTransition::Stale => {}
    }
    if transition != StreakTransition::Stale {
        record.last_visited = Some(match record.last_visited {
            Some(last) if last > now => last,
            _ => now,
        });
    }
    transition
}
