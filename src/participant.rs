use std::fmt;

use crate::error::ValidationError;

/// Accepted participant identifier (an email address in practice).
///
/// Stored trimmed. There is no way to change it after acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        if !trimmed.contains('@') {
            return Err(ValidationError::MissingAt);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
