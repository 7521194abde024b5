use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tally_types::{BadgeSet, DateKey, JobName, JobRunRecord, ProgressRecord, UserId};
use tracing::debug;

use super::{BadgeStore, InsertOutcome, JobRunLedger, ProgressStore, Versioned, WriteOutcome};
use crate::error::StoreError;

const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS progress (
  user_id TEXT PRIMARY KEY,
  version INTEGER NOT NULL CHECK (version >= 1),
  record_json TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS trg_progress_no_delete
BEFORE DELETE ON progress
BEGIN
  SELECT RAISE(FAIL, 'progress records are never deleted');
END;

CREATE TABLE IF NOT EXISTS badges (
  user_id TEXT PRIMARY KEY,
  badges_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS job_runs (
  job_name TEXT NOT NULL,
  date_key TEXT NOT NULL,
  claimed_at TEXT NOT NULL,
  PRIMARY KEY (job_name, date_key)
);

CREATE TRIGGER IF NOT EXISTS trg_job_runs_no_update
BEFORE UPDATE ON job_runs
BEGIN
  SELECT RAISE(FAIL, 'job_runs is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_job_runs_no_delete
BEFORE DELETE ON job_runs
BEGIN
  SELECT RAISE(FAIL, 'job_runs is append-only');
END;
";

/// SQLite backend. Uniqueness of `user_id` and of `(job_name, date_key)` is
/// enforced by primary keys; optimistic writes are single conditional
/// statements.
///
/// The connection is shared behind a mutex and every call runs on the
/// blocking pool, so the async executor never waits on disk I/O.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened sqlite store");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_V1)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("sqlite task failed: {e}")))?
    }
}

fn to_version(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative version {raw}")))
}

fn from_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Corrupt(format!("version {version} overflows")))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn load(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<ProgressRecord>>, StoreError> {
        let user_id = user_id.clone();
        self.with_conn(move |conn| {
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT version, record_json FROM progress WHERE user_id = ?1",
                    params![user_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(version, json)| {
                let value: ProgressRecord = decode(&json)?;
                if value.user_id != user_id {
                    return Err(StoreError::Corrupt(format!(
                        "row for {user_id} holds record of {}",
                        value.user_id
                    )));
                }
                Ok(Versioned {
                    version: to_version(version)?,
                    value,
                })
            })
            .transpose()
        })
        .await
    }

    async fn insert(&self, record: &ProgressRecord) -> Result<WriteOutcome, StoreError> {
        let user_id = record.user_id.clone();
        let json = encode(record)?;
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT INTO progress (user_id, version, record_json, updated_at)
                 VALUES (?1, 1, ?2, ?3)
                 ON CONFLICT(user_id) DO NOTHING",
                params![user_id.as_str(), json, timestamp(Utc::now())],
            )?;
            Ok(if changed == 1 {
                WriteOutcome::Written { version: 1 }
            } else {
                WriteOutcome::Conflict
            })
        })
        .await
    }

    async fn replace(
        &self,
        record: &ProgressRecord,
        expected_version: u64,
    ) -> Result<WriteOutcome, StoreError> {
        let user_id = record.user_id.clone();
        let json = encode(record)?;
        let expected = from_version(expected_version)?;
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE progress
                 SET version = version + 1, record_json = ?1, updated_at = ?2
                 WHERE user_id = ?3 AND version = ?4",
                params![json, timestamp(Utc::now()), user_id.as_str(), expected],
            )?;
            Ok(if changed == 1 {
                WriteOutcome::Written {
                    version: expected_version + 1,
                }
            } else {
                WriteOutcome::Conflict
            })
        })
        .await
    }
}

#[async_trait]
impl BadgeStore for SqliteStore {
    async fn badges(&self, user_id: &UserId) -> Result<Option<BadgeSet>, StoreError> {
        let user_id = user_id.clone();
        self.with_conn(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT badges_json FROM badges WHERE user_id = ?1",
                    params![user_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            json.as_deref().map(decode::<BadgeSet>).transpose()
        })
        .await
    }

    async fn award_badges(
        &self,
        user_id: &UserId,
        awarded: &BadgeSet,
    ) -> Result<BadgeSet, StoreError> {
        let user_id = user_id.clone();
        let awarded = awarded.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let existing: Option<String> = tx
                .query_row(
                    "SELECT badges_json FROM badges WHERE user_id = ?1",
                    params![user_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let mut held = existing
                .as_deref()
                .map(decode::<BadgeSet>)
                .transpose()?
                .unwrap_or_default();
            held.merge(&awarded);
            tx.execute(
                "INSERT INTO badges (user_id, badges_json) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET badges_json = excluded.badges_json",
                params![user_id.as_str(), encode(&held)?],
            )?;
            tx.commit()?;
            Ok(held)
        })
        .await
    }
}

#[async_trait]
impl JobRunLedger for SqliteStore {
    async fn insert_run(&self, run: &JobRunRecord) -> Result<InsertOutcome, StoreError> {
        let run = run.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT INTO job_runs (job_name, date_key, claimed_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(job_name, date_key) DO NOTHING",
                params![
                    run.job_name.as_str(),
                    run.date_key.as_str(),
                    timestamp(run.claimed_at)
                ],
            )?;
            Ok(if changed == 1 {
                InsertOutcome::Inserted
            } else {
                InsertOutcome::Duplicate
            })
        })
        .await
    }

    async fn find_run(
        &self,
        job_name: &JobName,
        date_key: &DateKey,
    ) -> Result<Option<JobRunRecord>, StoreError> {
        let job_name = job_name.clone();
        let date_key = date_key.clone();
        self.with_conn(move |conn| {
            let claimed_at: Option<String> = conn
                .query_row(
                    "SELECT claimed_at FROM job_runs WHERE job_name = ?1 AND date_key = ?2",
                    params![job_name.as_str(), date_key.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            claimed_at
                .map(|raw| {
                    let claimed_at = DateTime::parse_from_rfc3339(&raw)
                        .map_err(|e| StoreError::Corrupt(format!("claimed_at '{raw}': {e}")))?
                        .with_timezone(&Utc);
                    Ok(JobRunRecord {
                        job_name,
                        date_key,
                        claimed_at,
                    })
                })
                .transpose()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use similar_asserts::assert_eq;

    fn record(user: &str) -> ProgressRecord {
        ProgressRecord::new(UserId::new(user).unwrap())
    }

    fn run(date: &str) -> JobRunRecord {
        JobRunRecord {
            job_name: JobName::new("send-potd").unwrap(),
            date_key: DateKey::parse(date).unwrap(),
            claimed_at: Utc.with_ymd_and_hms(2024, 6, 1, 2, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn progress_round_trips_with_versions() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut r = record("u1");
        r.solved_question_keys.insert("q1".into());
        r.easy_solved = 1;
        r.total_solved = 1;

        assert_eq!(store.insert(&r).await.unwrap(), WriteOutcome::Written { version: 1 });
        assert_eq!(store.insert(&r).await.unwrap(), WriteOutcome::Conflict);

        r.streak_count = 1;
        assert_eq!(store.replace(&r, 1).await.unwrap(), WriteOutcome::Written { version: 2 });
        assert_eq!(store.replace(&r, 1).await.unwrap(), WriteOutcome::Conflict);

        let loaded = store.load(&r.user_id).await.unwrap().unwrap();
        assert_eq!(loaded, Versioned { version: 2, value: r });
    }

    #[tokio::test]
    async fn unknown_user_loads_as_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load(&UserId::new("nobody").unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_claim_is_a_value_not_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.insert_run(&run("2024-06-01")).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_run(&run("2024-06-01")).await.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.insert_run(&run("2024-06-02")).await.unwrap(), InsertOutcome::Inserted);

        let found = store
            .find_run(&JobName::new("send-potd").unwrap(), &DateKey::parse("2024-06-01").unwrap())
            .await
            .unwrap();
        assert_eq!(found, Some(run("2024-06-01")));
    }

    #[tokio::test]
    async fn other_constraint_failures_are_errors_not_duplicates() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER trg_job_runs_reject BEFORE INSERT ON job_runs
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.insert_run(&run("2024-06-01")).await.unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn awarded_badges_accumulate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = UserId::new("u1").unwrap();

        store
            .award_badges(&user, &["first-solve"].into_iter().collect())
            .await
            .unwrap();
        let held = store
            .award_badges(&user, &["streak-3"].into_iter().collect())
            .await
            .unwrap();

        assert_eq!(held, ["first-solve", "streak-3"].into_iter().collect::<BadgeSet>());
        assert_eq!(store.badges(&user).await.unwrap(), Some(held));
    }

    #[tokio::test]
    async fn corrupt_rows_are_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO progress (user_id, version, record_json, updated_at)
                     VALUES ('u1', 1, 'not json', 'now')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.load(&UserId::new("u1").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn records_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&record("u1")).await.unwrap();
            store.insert_run(&run("2024-06-01")).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.load(&UserId::new("u1").unwrap()).await.unwrap().is_some());
        assert_eq!(store.insert_run(&run("2024-06-01")).await.unwrap(), InsertOutcome::Duplicate);
    }
}
