use serde::{Deserialize, Serialize};
use tally_types::ProgressRecord;

/// What the solved-key ledger decided for one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveCredit {
    /// The event carried no solved key: a plain visit.
    NoKey,
    /// The key was already credited to this user.
    Duplicate,
    /// First time this key is seen. Gates counter and topic increments.
    NewlySolved,
}

impl SolveCredit {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::NewlySolved)
    }
}

/// Test `key` against the record's ledger and insert it if unseen.
///
/// Membership is decided before anything else in the fold reads the
/// credit, so a key is credited at most once per user no matter how
/// often the event is replayed.
pub fn credit_solve(record: &mut ProgressRecord, key: Option<&str>) -> SolveCredit {
    let Some(key) = key else {
        return SolveCredit::NoKey;
    };
    if record.has_solved(key) {
        return SolveCredit::Duplicate;
    }
    record.solved_question_keys.insert(key.to_string());
    SolveCredit::NewlySolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::UserId;

    fn record() -> ProgressRecord {
        ProgressRecord::new(UserId::new("u1").unwrap())
    }

    #[test]
    fn absent_key_is_a_plain_visit() {
        let mut r = record();
        assert_eq!(credit_solve(&mut r, None), SolveCredit::NoKey);
        assert!(r.solved_question_keys.is_empty());
    }

    #[test]
    fn first_sighting_is_credited_once() {
        let mut r = record();
        assert_eq!(credit_solve(&mut r, Some("q1")), SolveCredit::NewlySolved);
        assert_eq!(credit_solve(&mut r, Some("q1")), SolveCredit::Duplicate);
        assert_eq!(r.solved_question_keys.len(), 1);
    }

    #[test]
    fn ledger_only_grows() {
        let mut r = record();
        let mut previous = 0;
        for key in ["q1", "q2", "q1", "q3", "q2"] {
            credit_solve(&mut r, Some(key));
            assert!(r.solved_question_keys.len() >= previous);
            previous = r.solved_question_keys.len();
        }
        assert_eq!(
            r.solved_question_keys.iter().collect::<Vec<_>>(),
            vec!["q1", "q2", "q3"]
        );
    }
}
