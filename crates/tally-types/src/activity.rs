use crate::error::ValidationError;
use crate::user_id::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Difficulty tag carried by a solved problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(ValidationError::UnknownDifficulty {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity report exactly as it arrives from a client session.
///
/// Every field is optional at this layer so that a malformed report can be
/// turned into a [`ValidationError`] instead of a generic decode failure.
/// Use [`ActivityEvent::try_from`] to obtain the validated form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, alias = "questionDifficulty")]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default)]
    pub topic_total_questions: Option<u32>,
    #[serde(default)]
    pub solved_question_key: Option<String>,
}

/// Topic a solved problem belongs to, with the topic's declared size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicReport {
    pub name: String,
    pub total_questions: u32,
}

/// A validated visit and/or solve report for a single user.
///
/// Invariants established by construction:
/// - `topic.total_questions >= 1`
/// - `topic.name` and `solved_question_key` are non-empty when present
///
/// A zero question total or an empty solved key reads as "not supplied":
/// the rest of the report still applies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: UserId,
    pub difficulty: Option<Difficulty>,
    pub topic: Option<TopicReport>,
    pub solved_question_key: Option<String>,
}

impl ActivityEvent {
    /// A plain visit: refreshes the streak, credits nothing.
    pub fn visit(user_id: UserId) -> Self {
        Self {
            user_id,
            difficulty: None,
            topic: None,
            solved_question_key: None,
        }
    }

    pub fn solved(mut self, key: impl Into<String>, difficulty: Difficulty) -> Self {
        self.solved_question_key = Some(key.into());
        self.difficulty = Some(difficulty);
        self
    }

    pub fn in_topic(mut self, name: impl Into<String>, total_questions: u32) -> Self {
        self.topic = Some(TopicReport {
            name: name.into(),
            total_questions,
        });
        self
    }
}

impl TryFrom<RawActivity> for ActivityEvent {
    type Error = ValidationError;

    fn try_from(raw: RawActivity) -> Result<Self, Self::Error> {
        let user_id = UserId::new(raw.user_id.unwrap_or_default())?;

        let difficulty = raw
            .difficulty
            .as_deref()
            .map(Difficulty::from_str)
            .transpose()?;

        let topic = match (raw.topic_name, raw.topic_total_questions) {
            (None, None) => None,
            (None, Some(_)) => return Err(ValidationError::TopicTotalWithoutTopic),
            (Some(name), _) if name.trim().is_empty() => {
                return Err(ValidationError::EmptyTopicName);
            }
            (Some(name), None) => return Err(ValidationError::MissingTopicTotal { topic: name }),
            (Some(_), Some(0)) => None,
            (Some(name), Some(total_questions)) => Some(TopicReport {
                name,
                total_questions,
            }),
        };

        let solved_question_key = raw.solved_question_key.filter(|key| !key.is_empty());

        Ok(Self {
            user_id,
            difficulty,
            topic,
            solved_question_key,
        })
    }
}
