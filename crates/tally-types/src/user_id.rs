use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the user a progress record belongs to.
///
/// Never empty or whitespace-only. The value is otherwise not interpreted;
/// whatever the session layer hands over is used verbatim as the storage key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::MissingUserId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_rejected() {
        assert_eq!(UserId::new(""), Err(ValidationError::MissingUserId));
        assert_eq!(UserId::new("   "), Err(ValidationError::MissingUserId));
    }

    #[test]
    fn ids_are_kept_verbatim() {
        let id = UserId::new(" u1").unwrap();
        assert_eq!(id.as_str(), " u1");
        assert_eq!(id.to_string(), " u1");
    }

    #[test]
    fn deserializing_a_blank_id_fails() {
        let parsed: Result<UserId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }
}
