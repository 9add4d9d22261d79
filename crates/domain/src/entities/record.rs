//! Canonical cached record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::DomainError;
use crate::value_objects::{EntityType, ScalarValue};

/// Where the stored version of a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Fetched from the remote content provider.
    Provider,
    /// Loaded by an offline import.
    Import,
}

impl RecordOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOrigin::Provider => "provider",
            RecordOrigin::Import => "import",
        }
    }
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordOrigin {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider" => Ok(Self::Provider),
            "import" => Ok(Self::Import),
            _ => Err(DomainError::parse(format!("Unknown record origin: {}", s))),
        }
    }
}

/// A normalized content record keyed by `(entity_type, key)`.
///
/// `payload` always holds the complete document; `attributes` is the
/// subset promoted for filtering. Upserts replace both wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, ScalarValue>,
    pub payload: serde_json::Value,
    pub origin: RecordOrigin,
    #[serde(default)]
    pub origin_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl EntityRecord {
    /// Create a record observed at `now`. Both timestamps start at `now`;
    /// the store keeps the original `first_seen_at` on later upserts.
    pub fn new(
        entity_type: EntityType,
        key: impl Into<String>,
        display_name: impl Into<String>,
        payload: serde_json::Value,
        origin: RecordOrigin,
        origin_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_type,
            key: key.into(),
            display_name: display_name.into(),
            attributes: BTreeMap::new(),
            payload,
            origin,
            origin_id: origin_id.into(),
            first_seen_at: now,
            last_updated_at: now,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Check the structural invariants a record must satisfy before it can be
    /// written under `entity_type`.
    pub fn validate_for(&self, entity_type: &EntityType) -> Result<(), RecordInvalid> {
        if &self.entity_type != entity_type {
            return Err(RecordInvalid::EntityTypeMismatch {
                expected: entity_type.to_string(),
                found: self.entity_type.to_string(),
            });
        }
        if self.key.trim().is_empty() {
            return Err(RecordInvalid::EmptyKey);
        }
        if self.display_name.trim().is_empty() {
            return Err(RecordInvalid::EmptyDisplayName {
                key: self.key.clone(),
            });
        }
        Ok(())
    }

    /// Sort key for the stable result ordering: display name, then key.
    pub fn ordering_key(&self) -> (&str, &str) {
        (&self.display_name, &self.key)
    }
}

/// Why a single record was rejected from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RecordInvalid {
    #[error("record key is empty")]
    EmptyKey,
    #[error("record {key} has an empty display name")]
    EmptyDisplayName { key: String },
    #[error("record belongs to {found}, batch is for {expected}")]
    EntityTypeMismatch { expected: String, found: String },
}

/// A record rejected from a batch together with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub record: EntityRecord,
    pub reason: RecordInvalid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn spells() -> EntityType {
        EntityType::new("spells").expect("valid entity type")
    }

    fn fireball() -> EntityRecord {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().expect("valid time");
        EntityRecord::new(
            spells(),
            "fireball",
            "Fireball",
            json!({"slug": "fireball", "name": "Fireball", "level_int": 3}),
            RecordOrigin::Provider,
            "open5e",
            now,
        )
        .with_attribute("level", 3i64)
    }

    #[test]
    fn new_record_starts_with_equal_timestamps() {
        let record = fireball();
        assert_eq!(record.first_seen_at, record.last_updated_at);
        assert_eq!(record.attributes.get("level"), Some(&ScalarValue::Integer(3)));
    }

    #[test]
    fn validate_rejects_empty_key() {
        let mut record = fireball();
        record.key = "  ".to_string();
        assert_eq!(record.validate_for(&spells()), Err(RecordInvalid::EmptyKey));
    }

    #[test]
    fn validate_rejects_empty_display_name() {
        let mut record = fireball();
        record.display_name.clear();
        assert!(matches!(
            record.validate_for(&spells()),
            Err(RecordInvalid::EmptyDisplayName { .. })
        ));
    }

    #[test]
    fn validate_rejects_foreign_entity_type() {
        let record = fireball();
        let creatures = EntityType::new("creatures").expect("valid entity type");
        assert!(matches!(
            record.validate_for(&creatures),
            Err(RecordInvalid::EntityTypeMismatch { .. })
        ));
    }

    #[test]
    fn origin_round_trips_through_str() {
        assert_eq!("import".parse::<RecordOrigin>(), Ok(RecordOrigin::Import));
        assert!("cache".parse::<RecordOrigin>().is_err());
    }
}
