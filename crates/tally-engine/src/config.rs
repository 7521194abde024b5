use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_types::{DEFAULT_UTC_OFFSET_MINUTES, JobName, ReferenceZone};
use tracing::info;

use crate::error::ConfigError;

/// Tunables shared by the coordinator, the daily guard and the broadcast.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// storage_timeout_ms = 500
/// utc_offset_minutes = 0
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    storage_timeout_ms: u64,
    collaborator_timeout_ms: u64,
    max_write_attempts: u32,
    utc_offset_minutes: i32,
    potd_job_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_timeout_ms: 2000,
            collaborator_timeout_ms: 5000,
            max_write_attempts: 5,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            potd_job_name: "send-potd".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn storage_timeout_ms(mut self, ms: u64) -> Self {
        self.storage_timeout_ms = ms;
        self
    }

    pub fn collaborator_timeout_ms(mut self, ms: u64) -> Self {
        self.collaborator_timeout_ms = ms;
        self
    }

    pub fn max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    pub fn utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn potd_job_name(mut self, name: impl Into<String>) -> Self {
        self.potd_job_name = name.into();
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage_timeout_ms must be positive".into(),
            ));
        }
        if self.collaborator_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "collaborator_timeout_ms must be positive".into(),
            ));
        }
        if self.max_write_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_write_attempts must be at least 1".into(),
            ));
        }
        self.zone()?;
        self.job_name()?;
        Ok(())
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    pub fn write_attempts(&self) -> u32 {
        self.max_write_attempts
    }

    pub fn zone(&self) -> Result<ReferenceZone, ConfigError> {
        ReferenceZone::from_offset_minutes(self.utc_offset_minutes)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn job_name(&self) -> Result<JobName, ConfigError> {
        JobName::new(self.potd_job_name.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.storage_timeout(), Duration::from_secs(2));
        assert_eq!(config.write_attempts(), 5);
        assert_eq!(config.zone().unwrap(), ReferenceZone::default());
        assert_eq!(config.job_name().unwrap().as_str(), "send-potd");
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            storage_timeout_ms = 250
            utc_offset_minutes = 0
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            EngineConfig::default()
                .storage_timeout_ms(250)
                .utc_offset_minutes(0)
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineConfig::from_toml_str("max_write_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("utc_offset_minutes = 100000").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("potd_job_name = ''").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("storage_timeout_ms = 'soon'").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "collaborator_timeout_ms = 42").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.collaborator_timeout(), Duration::from_millis(42));
    }

    #[test]
    fn load_reports_missing_files() {
        let err = EngineConfig::load(Path::new("/nonexistent/tally.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
