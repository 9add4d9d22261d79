//! Caller-facing filter names.
//!
//! Maps aliases such as `min_level` to the canonical `(field, operator)` pair
//! they stand for. Pure lookup; loaded once at startup.

use grimoire_domain::FilterOp;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::config::ConfigError;

/// Canonical target of an alias.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AliasTarget {
    pub field: String,
    pub op: FilterOp,
}

/// Alias table.
#[derive(Debug, Clone, Default)]
pub struct FilterAliases {
    aliases: HashMap<String, AliasTarget>,
}

impl FilterAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, alias: &str, field: &str, op: FilterOp) -> Self {
        self.aliases.insert(
            alias.to_string(),
            AliasTarget {
                field: field.to_string(),
                op,
            },
        );
        self
    }

    pub fn resolve(&self, alias: &str) -> Option<(&str, FilterOp)> {
        self.aliases
            .get(alias)
            .map(|target| (target.field.as_str(), target.op))
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Aliases for the SRD schemas.
    pub fn srd_defaults() -> Self {
        Self::new()
            .with("slug", "key", FilterOp::Eq)
            .with("search", "name", FilterOp::Contains)
            .with("min_level", "level", FilterOp::RangeGte)
            .with("max_level", "level", FilterOp::RangeLte)
            .with("cr", "challenge_rating", FilterOp::Eq)
            .with("min_cr", "challenge_rating", FilterOp::RangeGte)
            .with("max_cr", "challenge_rating", FilterOp::RangeLte)
            .with("class", "dnd_class", FilterOp::Contains)
    }

    /// Load a table from a JSON object of `{"alias": {"field": .., "op": ..}}`.
    /// Entries override the SRD defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Aliases {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let overrides: HashMap<String, AliasTarget> =
            serde_json::from_str(&content).map_err(|e| ConfigError::Aliases {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut aliases = Self::srd_defaults();
        aliases.aliases.extend(overrides);
        Ok(aliases)
    }
}
