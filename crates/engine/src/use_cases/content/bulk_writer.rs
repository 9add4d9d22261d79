//! Atomic batch upserts.

use grimoire_domain::{
    extract_path, EntityRecord, EntityType, RejectedRecord, ScalarValue, SchemaRegistry,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::infrastructure::ports::{ClockPort, EntityStore, StoreError};

/// What a batch upsert did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Stored versions of the applied records, in batch order.
    pub applied: Vec<EntityRecord>,
    pub rejected: Vec<RejectedRecord>,
}

impl BatchOutcome {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Validates batches and applies the valid part in one store transaction.
#[derive(Clone)]
pub struct BulkWriter {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn ClockPort>,
    registry: Arc<SchemaRegistry>,
}

impl BulkWriter {
    pub fn new(
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn ClockPort>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            store,
            clock,
            registry,
        }
    }

    /// Upsert `records` under `entity_type`.
    ///
    /// Invalid records are rejected individually; the rest are written in a
    /// single transaction or not at all. A key repeated within the batch keeps
    /// its last occurrence.
    pub async fn upsert(
        &self,
        entity_type: &EntityType,
        records: Vec<EntityRecord>,
    ) -> Result<BatchOutcome, StoreError> {
        let mut valid: Vec<EntityRecord> = Vec::with_capacity(records.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut rejected = Vec::new();

        for record in records {
            if let Err(reason) = record.validate_for(entity_type) {
                tracing::warn!(
                    entity_type = %entity_type,
                    key = %record.key,
                    reason = %reason,
                    "Rejected record"
                );
                rejected.push(RejectedRecord { record, reason });
                continue;
            }

            let record = self.with_schema_attributes(record);
            match positions.get(&record.key) {
                Some(&index) => valid[index] = record,
                None => {
                    positions.insert(record.key.clone(), valid.len());
                    valid.push(record);
                }
            }
        }

        if valid.is_empty() {
            return Ok(BatchOutcome {
                applied: Vec::new(),
                rejected,
            });
        }

        let now = self.clock.now();
        let applied = self.store.upsert(entity_type, valid, now).await?;

        tracing::debug!(
            entity_type = %entity_type,
            applied = applied.len(),
            rejected = rejected.len(),
            "Applied batch"
        );

        Ok(BatchOutcome { applied, rejected })
    }

    /// Re-derive the schema attributes from the payload so the queryable
    /// columns always agree with it.
    fn with_schema_attributes(&self, mut record: EntityRecord) -> EntityRecord {
        let Some(schema) = self.registry.get(&record.entity_type) else {
            return record;
        };
        for def in &schema.attributes {
            match extract_path(&record.payload, &def.path)
                .and_then(|raw| ScalarValue::coerce_json(raw, def.kind))
            {
                Some(value) => {
                    record.attributes.insert(def.name.clone(), value);
                }
                None => {
                    // Keep a caller-supplied value only if it fits the kind.
                    if let Some(supplied) = record.attributes.remove(&def.name) {
                        if let Ok(conformed) = supplied.conform_to(def.kind) {
                            record.attributes.insert(def.name.clone(), conformed);
                        }
                    }
                }
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::MockEntityStore;
    use crate::infrastructure::sqlite::SqliteEntityStore;
    use chrono::{DateTime, TimeZone, Utc};
    use grimoire_domain::{RecordInvalid, RecordOrigin};
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).single().expect("valid time")
    }

    fn spells() -> EntityType {
        EntityType::new("spells").expect("valid entity type")
    }

    fn spell(key: &str, name: &str) -> EntityRecord {
        EntityRecord::new(
            spells(),
            key,
            name,
            json!({"slug": key, "name": name, "level_int": 3, "school": "Evocation"}),
            RecordOrigin::Import,
            "spells.json",
            at(0),
        )
    }

    fn writer(store: Arc<dyn EntityStore>, hour: u32) -> BulkWriter {
        BulkWriter::new(
            store,
            Arc::new(FixedClock(at(hour))),
            Arc::new(SchemaRegistry::srd_defaults()),
        )
    }

    #[tokio::test]
    async fn invalid_records_are_rejected_individually() {
        let store: Arc<dyn EntityStore> =
            Arc::new(SqliteEntityStore::open_in_memory().await.expect("open"));
        let creature = EntityRecord::new(
            EntityType::new("creatures").expect("valid"),
            "goblin",
            "Goblin",
            json!({}),
            RecordOrigin::Import,
            "creatures.json",
            at(0),
        );

        let outcome = writer(store.clone(), 1)
            .upsert(
                &spells(),
                vec![spell("fireball", "Fireball"), spell("", "Nothing"), spell("wish", " "), creature],
            )
            .await
            .expect("upsert");

        assert_eq!(outcome.applied_count(), 1);
        let reasons: Vec<_> = outcome.rejected.iter().map(|r| r.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                RecordInvalid::EmptyKey,
                RecordInvalid::EmptyDisplayName {
                    key: "wish".to_string()
                },
                RecordInvalid::EntityTypeMismatch {
                    expected: "spells".to_string(),
                    found: "creatures".to_string()
                },
            ]
        );
        assert_eq!(store.count(&spells()).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn reapplying_a_batch_keeps_first_seen() {
        let store: Arc<dyn EntityStore> =
            Arc::new(SqliteEntityStore::open_in_memory().await.expect("open"));
        let batch = vec![spell("fireball", "Fireball"), spell("shield", "Shield")];

        writer(store.clone(), 1)
            .upsert(&spells(), batch.clone())
            .await
            .expect("first upsert");
        let second = writer(store.clone(), 4)
            .upsert(&spells(), batch)
            .await
            .expect("second upsert");

        for record in &second.applied {
            assert_eq!(record.first_seen_at, at(1));
            assert_eq!(record.last_updated_at, at(4));
        }
        assert_eq!(store.count(&spells()).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn attributes_are_derived_from_payload() {
        let store: Arc<dyn EntityStore> =
            Arc::new(SqliteEntityStore::open_in_memory().await.expect("open"));
        let record = spell("fireball", "Fireball")
            .with_attribute("level", 9)
            .with_attribute("ritual", "yes")
            .with_attribute("homebrew", true);

        let outcome = writer(store, 1)
            .upsert(&spells(), vec![record])
            .await
            .expect("upsert");

        let stored = &outcome.applied[0];
        assert_eq!(stored.attributes.get("level"), Some(&ScalarValue::Integer(3)));
        assert_eq!(stored.attributes.get("ritual"), Some(&ScalarValue::Bool(true)));
        assert_eq!(stored.attributes.get("homebrew"), Some(&ScalarValue::Bool(true)));
        assert_eq!(
            stored.attributes.get("school"),
            Some(&ScalarValue::text("Evocation"))
        );
    }

    #[tokio::test]
    async fn duplicate_keys_keep_the_last_occurrence() {
        let mut store = MockEntityStore::new();
        store
            .expect_upsert()
            .withf(|_, records, _| records.len() == 1 && records[0].display_name == "Fireball (revised)")
            .times(1)
            .returning(|_, records, _| Ok(records));

        let outcome = writer(Arc::new(store), 1)
            .upsert(
                &spells(),
                vec![spell("fireball", "Fireball"), spell("fireball", "Fireball (revised)")],
            )
            .await
            .expect("upsert");
        assert_eq!(outcome.applied_count(), 1);
    }

    #[tokio::test]
    async fn all_invalid_batch_never_reaches_the_store() {
        let mut store = MockEntityStore::new();
        store.expect_upsert().times(0);

        let outcome = writer(Arc::new(store), 1)
            .upsert(&spells(), vec![spell("", "Nothing")])
            .await
            .expect("upsert");
        assert_eq!(outcome.applied_count(), 0);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_applies_nothing() {
        let mut store = MockEntityStore::new();
        store
            .expect_upsert()
            .returning(|_, _, _| Err(StoreError::database("upsert", "disk I/O error")));

        let result = writer(Arc::new(store), 1)
            .upsert(&spells(), vec![spell("fireball", "Fireball")])
            .await;
        assert!(matches!(result, Err(StoreError::Database { .. })));
    }
}
