//! Validated entity type name (the logical table a record lives in).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Maximum length for entity type names
const MAX_ENTITY_TYPE_LENGTH: usize = 64;

/// A validated entity type name such as `spells` or `magicitems`.
///
/// Lowercase ASCII letters, digits, `_` and `-` only. Entity type names
/// end up in URLs and log fields, so anything else is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    /// Create a new validated entity type name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEntityType` if the name is empty, too long,
    /// or contains characters outside `[a-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let trimmed = name.trim();
        let well_formed = !trimmed.is_empty()
            && trimmed.len() <= MAX_ENTITY_TYPE_LENGTH
            && trimmed
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !well_formed {
            return Err(DomainError::unknown_entity_type(name));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EntityType {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for EntityType {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> String {
        entity_type.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(EntityType::new("spells").map(|t| t.to_string()), Ok("spells".to_string()));
        assert!(EntityType::new("magic_items").is_ok());
        assert!(EntityType::new(" creatures ").is_ok());
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(EntityType::new("").is_err());
        assert!(EntityType::new("Spells").is_err());
        assert!(EntityType::new("spells; drop table").is_err());
        assert!(EntityType::new("x".repeat(65)).is_err());
    }
}
