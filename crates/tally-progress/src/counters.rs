//! Difficulty counters and per-topic progress.
//!
//! Both are only advanced by a [`SolveCredit::NewlySolved`] event. The
//! running total is never incremented on its own: it is recomputed from the
//! three difficulty counters after every change.

use serde::{Deserialize, Serialize};
use tally_types::{Difficulty, ProgressRecord, TopicProgress, TopicReport};
use tracing::debug;

use crate::ledger::SolveCredit;

/// What happened to the topic entry named by an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopicChange {
    /// New entry appended with the given starting count (0 or 1).
    Created { solved_count: u32 },
    /// Existing entry advanced by one.
    Advanced,
    /// Existing entry already at its declared total.
    Capped,
    /// Existing entry left alone because the solve was not new.
    Untouched,
}

/// Increment the counter for `difficulty` when the solve is new, then
/// recompute `total_solved`.
///
/// Returns whether a counter moved.
pub fn apply_difficulty(
    record: &mut ProgressRecord,
    difficulty: Option<Difficulty>,
    credit: SolveCredit,
) -> bool {
    let Some(difficulty) = difficulty.filter(|_| credit.is_new()) else {
        return false;
    };
    let counter = match difficulty {
        Difficulty::Easy => &mut record.easy_solved,
        Difficulty::Medium => &mut record.medium_solved,
        Difficulty::Hard => &mut record.hard_solved,
    };
    *counter = counter.saturating_add(1);
    recompute_total(record);
    true
}

/// Set `total_solved` to the sum of the difficulty counters.
///
/// A sum past `u32::MAX` saturates; the invariant checker then reports the
/// record instead of letting a wrapped total be persisted.
pub fn recompute_total(record: &mut ProgressRecord) {
    record.total_solved = u32::try_from(record.difficulty_sum()).unwrap_or(u32::MAX);
}

/// Fold a topic report into `topics_progress`.
///
/// The declared total of an existing entry is kept as first recorded; a
/// differing total on a later event is ignored.
pub fn apply_topic(
    record: &mut ProgressRecord,
    topic: &TopicReport,
    credit: SolveCredit,
) -> TopicChange {
    let newly_solved = credit.is_new();

    let Some(index) = record
        .topics_progress
        .iter()
        .position(|t| t.topic_name == topic.name)
    else {
        let solved_count = u32::from(newly_solved).min(topic.total_questions);
        record.topics_progress.push(TopicProgress {
            topic_name: topic.name.clone(),
            solved_count,
            total_questions: topic.total_questions,
        });
        return TopicChange::Created { solved_count };
    };
    let entry = &mut record.topics_progress[index];

    if entry.total_questions != topic.total_questions {
        debug!(
            topic = %topic.name,
            recorded = entry.total_questions,
            reported = topic.total_questions,
            "ignoring changed topic total"
        );
    }

    if !newly_solved {
        return TopicChange::Untouched;
    }
    if entry.solved_count >= entry.total_questions {
        return TopicChange::Capped;
    }
    entry.solved_count += 1;
    TopicChange::Advanced
}
