use std::path::PathBuf;
use std::time::Duration;

use tally_progress::ProgressError;
use tally_types::{UserId, ValidationError};
use thiserror::Error;

/// Failures reported by a storage backend.
///
/// Expected conflicts (a lost optimistic write, a duplicate job claim) are
/// not errors; backends report them through their outcome types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Corrupt(_) => false,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Sqlite(_) => false,
        }
    }
}

/// Failure reported by an external collaborator (badge rules, mail, etc).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("gave up on {user_id} after {attempts} conflicting writes")]
    Contention { user_id: UserId, attempts: u32 },
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether the caller should retry the whole request later.
    ///
    /// A timed-out write may or may not have landed; replaying the same
    /// activity is safe because solved keys are credited at most once.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Contention { .. } => true,
            Self::Storage(err) => err.is_transient(),
            Self::Validation(_)
            | Self::Progress(_)
            | Self::Collaborator(_)
            | Self::Config(_) => false,
        }
    }
}
