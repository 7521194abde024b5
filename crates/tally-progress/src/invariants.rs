//! Progress-record invariant checking.
//!
//! Two modes, as with any persisted aggregate:
//! - **Transition** ([`check_transition`]): compares the record about to be
//!   written with the version it was loaded as. Short-circuits on the first
//!   violation and runs before every write.
//! - **Batch** ([`validate_record`]): collects every shape violation of a
//!   single record. Used for diagnostics on loaded data.

use std::collections::HashSet;

use tally_types::ProgressRecord;

use crate::error::RecordViolation;

/// Collect all shape violations of `record`.
pub fn validate_record(record: &ProgressRecord) -> Vec<RecordViolation> {
    let mut violations = Vec::new();

    if u64::from(record.total_solved) != record.difficulty_sum() {
        violations.push(RecordViolation::TotalMismatch {
            total_solved: record.total_solved,
            difficulty_sum: record.difficulty_sum(),
        });
    }

    let mut seen = HashSet::new();
    for topic in &record.topics_progress {
        if !seen.insert(topic.topic_name.as_str()) {
            violations.push(RecordViolation::DuplicateTopic {
                topic_name: topic.topic_name.clone(),
            });
        }
        if topic.solved_count > topic.total_questions {
            violations.push(RecordViolation::TopicOverflow {
                topic_name: topic.topic_name.clone(),
                solved_count: topic.solved_count,
                total_questions: topic.total_questions,
            });
        }
    }

    violations
}

/// Validate that `after` is a legal successor of `before`.
///
/// Shape checks run first, then monotonicity: the solved ledger, the
/// difficulty counters, topic entries and `last_visited` may only grow. The
/// streak is exempt since a reset is a legal transition.
pub fn check_transition(
    before: &ProgressRecord,
    after: &ProgressRecord,
) -> Result<(), RecordViolation> {
    if let Some(violation) = validate_record(after).into_iter().next() {
        return Err(violation);
    }

    if before.user_id != after.user_id {
        return Err(RecordViolation::UserChanged {
            expected: before.user_id.clone(),
            actual: after.user_id.clone(),
        });
    }

    if let Some(key) = before
        .solved_question_keys
        .difference(&after.solved_question_keys)
        .next()
    {
        return Err(RecordViolation::SolvedKeyRemoved { key: key.clone() });
    }

    for (counter, b, a) in [
        ("easy_solved", before.easy_solved, after.easy_solved),
        ("medium_solved", before.medium_solved, after.medium_solved),
        ("hard_solved", before.hard_solved, after.hard_solved),
    ] {
        if a < b {
            return Err(RecordViolation::CounterRegressed {
                counter,
                before: b,
                after: a,
            });
        }
    }

    for topic in &before.topics_progress {
        match after.topic(&topic.topic_name) {
            None => {
                return Err(RecordViolation::TopicRemoved {
                    topic_name: topic.topic_name.clone(),
                });
            }
            Some(next) if next.solved_count < topic.solved_count => {
                return Err(RecordViolation::CounterRegressed {
                    counter: "topic solved_count",
                    before: topic.solved_count,
                    after: next.solved_count,
                });
            }
            Some(_) => {}
        }
    }

    match (before.last_visited, after.last_visited) {
        (Some(_), None) => return Err(RecordViolation::VisitRegressed),
        (Some(b), Some(a)) if a < b => return Err(RecordViolation::VisitRegressed),
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tally_types::{TopicProgress, UserId};

    fn record() -> ProgressRecord {
        ProgressRecord::new(UserId::new("u1").unwrap())
    }

    fn topic(name: &str, solved: u32, total: u32) -> TopicProgress {
        TopicProgress {
            topic_name: name.into(),
            solved_count: solved,
            total_questions: total,
        }
    }

    #[test]
    fn fresh_record_is_valid() {
        assert!(validate_record(&record()).is_empty());
    }

    #[test]
    fn batch_reports_every_shape_violation() {
        let mut r = record();
        r.easy_solved = 2;
        r.total_solved = 1;
        r.topics_progress = vec![topic("arrays", 11, 10), topic("arrays", 0, 10)];

        let violations = validate_record(&r);

        assert_eq!(
            violations,
            vec![
                RecordViolation::TotalMismatch {
                    total_solved: 1,
                    difficulty_sum: 2,
                },
                RecordViolation::TopicOverflow {
                    topic_name: "arrays".into(),
                    solved_count: 11,
                    total_questions: 10,
                },
                RecordViolation::DuplicateTopic {
                    topic_name: "arrays".into(),
                },
            ]
        );
    }

    #[test]
    fn removed_solved_key_is_rejected() {
        let mut before = record();
        before.solved_question_keys.insert("q1".into());
        let after = record();

        assert_eq!(
            check_transition(&before, &after),
            Err(RecordViolation::SolvedKeyRemoved { key: "q1".into() })
        );
    }

    #[test]
    fn counter_regression_is_rejected() {
        let mut before = record();
        before.hard_solved = 2;
        before.total_solved = 2;
        let mut after = before.clone();
        after.hard_solved = 1;
        after.total_solved = 1;

        assert_eq!(
            check_transition(&before, &after),
            Err(RecordViolation::CounterRegressed {
                counter: "hard_solved",
                before: 2,
                after: 1,
            })
        );
    }

    #[test]
    fn streak_reset_is_a_legal_transition() {
        let now = Utc::now();
        let mut before = record();
        before.streak_count = 9;
        before.last_visited = Some(now);
        let mut after = before.clone();
        after.streak_count = 1;
        after.last_visited = Some(now + Duration::days(3));

        assert_eq!(check_transition(&before, &after), Ok(()));
    }

    #[test]
    fn visit_regression_is_rejected() {
        let now = Utc::now();
        let mut before = record();
        before.last_visited = Some(now);
        let mut after = before.clone();
        after.last_visited = Some(now - Duration::days(1));

        assert_eq!(
            check_transition(&before, &after),
            Err(RecordViolation::VisitRegressed)
        );
    }

    #[test]
    fn dropped_topic_is_rejected() {
        let mut before = record();
        before.topics_progress.push(topic("graphs", 1, 4));
        let after = record();

        assert_eq!(
            check_transition(&before, &after),
            Err(RecordViolation::TopicRemoved {
                topic_name: "graphs".into()
            })
        );
    }
}
