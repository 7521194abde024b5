use crate::activity::Difficulty;
use crate::user_id::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Solved/declared counts for one topic inside a [`ProgressRecord`].
///
/// `solved_count <= total_questions` always holds for persisted entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub topic_name: String,
    pub solved_count: u32,
    pub total_questions: u32,
}

/// Running per-user summary. One record per user, never deleted.
///
/// `total_solved` is derived: it always equals the sum of the three
/// difficulty counters. `solved_question_keys` only ever grows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub last_visited: Option<DateTime<Utc>>,
    pub streak_count: u32,
    pub easy_solved: u32,
    pub medium_solved: u32,
    pub hard_solved: u32,
    pub total_solved: u32,
    pub topics_progress: Vec<TopicProgress>,
    pub solved_question_keys: BTreeSet<String>,
}

impl ProgressRecord {
    /// Fresh record for a user that has never reported activity.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            last_visited: None,
            streak_count: 0,
            easy_solved: 0,
            medium_solved: 0,
            hard_solved: 0,
            total_solved: 0,
            topics_progress: Vec::new(),
            solved_question_keys: BTreeSet::new(),
        }
    }

    pub fn solved_for(&self, difficulty: Difficulty) -> u32 {
        match difficulty {
            Difficulty::Easy => self.easy_solved,
            Difficulty::Medium => self.medium_solved,
            Difficulty::Hard => self.hard_solved,
        }
    }

    /// Sum of the difficulty counters, widened so it cannot overflow.
    pub fn difficulty_sum(&self) -> u64 {
        u64::from(self.easy_solved) + u64::from(self.medium_solved) + u64::from(self.hard_solved)
    }

    pub fn topic(&self, name: &str) -> Option<&TopicProgress> {
        self.topics_progress.iter().find(|t| t.topic_name == name)
    }

    pub fn has_solved(&self, key: &str) -> bool {
        self.solved_question_keys.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_uses_camel_case() {
        let mut record = ProgressRecord::new(UserId::new("u1").unwrap());
        record.solved_question_keys.insert("q1".into());
        record.topics_progress.push(TopicProgress {
            topic_name: "arrays".into(),
            solved_count: 1,
            total_questions: 10,
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["streakCount"], 0);
        assert_eq!(json["solvedQuestionKeys"], serde_json::json!(["q1"]));
        assert_eq!(json["topicsProgress"][0]["topicName"], "arrays");
        assert_eq!(json["topicsProgress"][0]["totalQuestions"], 10);
        assert!(json["lastVisited"].is_null());
    }

    #[test]
    fn difficulty_sum_does_not_overflow() {
        let mut record = ProgressRecord::new(UserId::new("u1").unwrap());
        record.easy_solved = u32::MAX;
        record.hard_solved = 1;
        assert_eq!(record.difficulty_sum(), u64::from(u32::MAX) + 1);
    }
}
