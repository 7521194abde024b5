//! Daily "problem of the day" fan-out, run at most once per reference day.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_types::{DateKey, JobName};
use tracing::{info, instrument, warn};

use crate::collaborators::{Mailer, PotdMessage, ProblemOfTheDay, SubscriberDirectory};
use crate::config::EngineConfig;
use crate::error::{CollaboratorError, EngineError};
use crate::guard::{ClaimOutcome, DailyJobGuard};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BroadcastReport {
    /// Another run already claimed the day.
    Skipped { date_key: DateKey },
    Sent {
        date_key: DateKey,
        delivered: usize,
        failed: usize,
    },
}

pub struct PotdBroadcast {
    guard: DailyJobGuard,
    job_name: JobName,
    collaborator_timeout: Duration,
    subscribers: Arc<dyn SubscriberDirectory>,
    problems: Arc<dyn ProblemOfTheDay>,
    mailer: Arc<dyn Mailer>,
}

impl PotdBroadcast {
    pub fn new(
        config: &EngineConfig,
        guard: DailyJobGuard,
        subscribers: Arc<dyn SubscriberDirectory>,
        problems: Arc<dyn ProblemOfTheDay>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            guard,
            job_name: config.job_name()?,
            collaborator_timeout: config.collaborator_timeout(),
            subscribers,
            problems,
            mailer,
        })
    }

    /// Claim today's run and, if it was ours, mail every subscriber.
    ///
    /// Once the claim is taken it stays taken: an error while listing
    /// subscribers or picking the problem means no broadcast for that day.
    #[instrument(skip(self), fields(job = %self.job_name))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<BroadcastReport, EngineError> {
        let run = match self.guard.try_claim(self.job_name.as_str(), now).await? {
            ClaimOutcome::Claimed(run) => run,
            ClaimOutcome::AlreadyClaimed { date_key, .. } => {
                info!(%date_key, "broadcast already ran today");
                return Ok(BroadcastReport::Skipped { date_key });
            }
        };

        let recipients = self
            .call("subscribers", self.subscribers.subscribed_recipients())
            .await
            .inspect_err(|err| {
                warn!(error = %err, "claimed broadcast could not list subscribers")
            })?;
        let recipients = unique_recipients(recipients);

        let problem = self
            .call("problem of the day", self.problems.problem_for(&run.date_key))
            .await
            .inspect_err(|err| warn!(error = %err, "claimed broadcast has no problem"))?;

        let mut delivered = 0;
        let mut failed = 0;
        for recipient in recipients {
            let message = PotdMessage {
                recipient,
                date_key: run.date_key.clone(),
                problem: problem.clone(),
            };
            match self.call("mailer", self.mailer.deliver(&message)).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    failed += 1;
                    warn!(recipient = %message.recipient, error = %err, "delivery failed");
                }
            }
        }

        info!(date_key = %run.date_key, delivered, failed, "broadcast finished");
        Ok(BroadcastReport::Sent {
            date_key: run.date_key,
            delivered,
            failed,
        })
    }

    async fn call<T, F>(&self, collaborator: &'static str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.collaborator_timeout, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::Timeout {
                operation: collaborator,
                after: self.collaborator_timeout,
            }),
        }
    }
}

/// Trimmed, non-empty addresses in first-seen order.
fn unique_recipients(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|address| address.trim().to_owned())
        .filter(|address| !address.is_empty())
        .filter(|address| seen.insert(address.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Problem;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use tally_types::Difficulty;
    use tokio::sync::Mutex;

    struct Subscribers(Vec<String>);

    #[async_trait]
    impl SubscriberDirectory for Subscribers {
        async fn subscribed_recipients(&self) -> Result<Vec<String>, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    struct FixedProblem;

    #[async_trait]
    impl ProblemOfTheDay for FixedProblem {
        async fn problem_for(&self, _date_key: &DateKey) -> Result<Problem, CollaboratorError> {
            Ok(Problem {
                title: "Two Sum".into(),
                difficulty: Difficulty::Easy,
                links: BTreeMap::from([(
                    String::from("leetcode"),
                    String::from("https://leetcode.com/problems/two-sum"),
                )]),
                solution_link: None,
            })
        }
    }

    struct NoProblem;

    #[async_trait]
    impl ProblemOfTheDay for NoProblem {
        async fn problem_for(&self, _date_key: &DateKey) -> Result<Problem, CollaboratorError> {
            Err(CollaboratorError::new("problem of the day", "catalog empty"))
        }
    }

    /// Records deliveries and rejects addresses listed in `bounce`.
    #[derive(Default)]
    struct RecordingMailer {
        bounce: Vec<String>,
        sent: Mutex<Vec<PotdMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn deliver(&self, message: &PotdMessage) -> Result<(), CollaboratorError> {
            if self.bounce.contains(&message.recipient) {
                return Err(CollaboratorError::new("mailer", "mailbox unavailable"));
            }
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 3, 30, 0).unwrap()
    }

    fn broadcast(
        subscribers: Vec<&str>,
        problems: Arc<dyn ProblemOfTheDay>,
        mailer: Arc<RecordingMailer>,
    ) -> PotdBroadcast {
        let config = EngineConfig::default();
        let guard = DailyJobGuard::new(&config, Arc::new(MemoryStore::new())).unwrap();
        PotdBroadcast::new(
            &config,
            guard,
            Arc::new(Subscribers(subscribers.into_iter().map(String::from).collect())),
            problems,
            mailer,
        )
        .unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn sends_once_per_day() {
        let mailer = Arc::new(RecordingMailer::default());
        let broadcast = broadcast(vec!["a@x.io", "b@x.io"], Arc::new(FixedProblem), mailer.clone());
        let day = DateKey::parse("2024-06-01").unwrap();

        assert_eq!(
            broadcast.run(at(1)).await.unwrap(),
            BroadcastReport::Sent {
                date_key: day.clone(),
                delivered: 2,
                failed: 0
            }
        );
        assert_eq!(
            broadcast.run(at(1)).await.unwrap(),
            BroadcastReport::Skipped { date_key: day }
        );
        assert_eq!(mailer.sent.lock().await.len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn skips_blank_and_repeated_addresses() {
        let mailer = Arc::new(RecordingMailer::default());
        let broadcast = broadcast(
            vec!["a@x.io", "", "  ", " a@x.io", "b@x.io"],
            Arc::new(FixedProblem),
            mailer.clone(),
        );

        broadcast.run(at(1)).await.unwrap();

        let sent = mailer.sent.lock().await;
        let recipients: Vec<_> = sent.iter().map(|m| m.recipient.as_str()).collect();
        assert_eq!(recipients, ["a@x.io", "b@x.io"]);
    }

    #[test_log::test(tokio::test)]
    async fn delivery_failures_are_counted_not_fatal() {
        let mailer = Arc::new(RecordingMailer {
            bounce: vec!["b@x.io".into()],
            ..Default::default()
        });
        let broadcast = broadcast(
            vec!["a@x.io", "b@x.io", "c@x.io"],
            Arc::new(FixedProblem),
            mailer.clone(),
        );

        let report = broadcast.run(at(1)).await.unwrap();

        assert!(matches!(
            report,
            BroadcastReport::Sent {
                delivered: 2,
                failed: 1,
                ..
            }
        ));
    }

    #[test_log::test(tokio::test)]
    async fn failed_run_keeps_the_claim() {
        let mailer = Arc::new(RecordingMailer::default());
        let broadcast = broadcast(vec!["a@x.io"], Arc::new(NoProblem), mailer.clone());

        let err = broadcast.run(at(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::Collaborator(_)));

        assert!(matches!(
            broadcast.run(at(1)).await.unwrap(),
            BroadcastReport::Skipped { .. }
        ));
        assert!(matches!(
            broadcast.run(at(2)).await.unwrap_err(),
            EngineError::Collaborator(_)
        ));
        assert!(mailer.sent.lock().await.is_empty());
    }

    #[test]
    fn recipients_keep_first_seen_order() {
        let unique = unique_recipients(vec![
            "b@x.io".into(),
            "a@x.io".into(),
            "b@x.io ".into(),
        ]);
        assert_eq!(unique, ["b@x.io", "a@x.io"]);
    }
}
