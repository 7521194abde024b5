use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{ActivityEvent, ProgressRecord, ReferenceZone};

use crate::counters::{self, TopicChange};
use crate::error::ProgressError;
use crate::invariants;
use crate::ledger::{self, SolveCredit};
use crate::streak::{self, StreakTransition};

/// Per-step account of how one event changed a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldReport {
    pub streak: StreakTransition,
    pub credit: SolveCredit,
    pub difficulty_counted: bool,
    pub topic: Option<TopicChange>,
}

/// Fold `event` into a copy of `current`.
///
/// Steps run in a fixed order: streak, solved-key ledger, difficulty
/// counters, topic progress. The result is checked against `current` with
/// [`invariants::check_transition`] before it is returned, so callers only
/// ever see a record that is safe to persist. `current` itself is never
/// modified; dropping the result discards the whole update.
pub fn fold_activity(
    current: &ProgressRecord,
    event: &ActivityEvent,
    now: DateTime<Utc>,
    zone: ReferenceZone,
) -> Result<(ProgressRecord, FoldReport), ProgressError> {
    if event.user_id != current.user_id {
        return Err(ProgressError::WrongRecord {
            event_user: event.user_id.clone(),
            record_user: current.user_id.clone(),
        });
    }

    let mut next = current.clone();

    let streak = streak::apply_streak(&mut next, now, zone);
    let credit = ledger::credit_solve(&mut next, event.solved_question_key.as_deref());
    let difficulty_counted = counters::apply_difficulty(&mut next, event.difficulty, credit);
    let topic = event
        .topic
        .as_ref()
        .map(|topic| counters::apply_topic(&mut next, topic, credit));

    invariants::check_transition(current, &next).map_err(ProgressError::InvariantViolation)?;

    Ok((
        next,
        FoldReport {
            streak,
            credit,
            difficulty_counted,
            topic,
        },
    ))
}

/// Whether folding changed anything other than the visit timestamp.
pub fn is_visit_only(before: &ProgressRecord, after: &ProgressRecord) -> bool {
    let mut probe = after.clone();
    probe.last_visited = before.last_visited;
    probe == *before
}
