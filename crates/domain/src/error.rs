//! Unified error types for the domain layer
//!
//! Provides a common error type for record, schema and filter validation,
//! so adapters can map failures without resorting to String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., empty key, malformed filter value)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity type name is not registered or not well formed
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Filter references a field the entity type does not expose
    #[error("Unknown field '{field}' for entity type {entity_type}")]
    UnknownField { entity_type: String, field: String },

    /// Parse error (for operators and scalar values)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Creates a validation error for invariant violations.
    ///
    /// Use this when a record or filter is structurally invalid:
    /// - Required fields are empty or missing
    /// - Values have the wrong shape for an operator
    ///
    /// # Example
    /// ```ignore
    /// if key.trim().is_empty() {
    ///     return Err(DomainError::validation("record key cannot be empty"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an unknown entity type error
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType(name.into())
    }

    /// Create an unknown field error
    pub fn unknown_field(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity_type: entity_type.into(),
            field: field.into(),
        }
    }

    /// Creates a parse error for string-to-type conversion failures.
    ///
    /// # Example
    /// ```ignore
    /// impl FromStr for FilterOp {
    ///     type Err = DomainError;
    ///     fn from_str(s: &str) -> Result<Self, Self::Err> {
    ///         match s {
    ///             "eq" => Ok(Self::Eq),
    ///             _ => Err(DomainError::parse(format!("Unknown filter operator: {}", s))),
    ///         }
    ///     }
    /// }
    /// ```
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = DomainError::validation("key cannot be empty");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(err.to_string(), "Validation failed: key cannot be empty");
    }

    #[test]
    fn test_unknown_field_error() {
        let err = DomainError::unknown_field("spells", "hit_points");
        assert!(err.to_string().contains("spells"));
        assert!(err.to_string().contains("hit_points"));
    }

    #[test]
    fn test_parse_error() {
        let err = DomainError::parse("Unknown filter operator: between");
        assert_eq!(err.to_string(), "Parse error: Unknown filter operator: between");
    }
}
