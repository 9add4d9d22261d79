//! Entity store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grimoire_domain::{EntityRecord, EntityType};

use super::error::StoreError;
use super::types::{QueryWindow, StorePredicate};

/// Durable, queryable storage keyed by `(entity_type, key)`.
///
/// Implementations must apply `upsert` batches atomically: concurrent readers
/// see either none or all of a batch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(
        &self,
        entity_type: &EntityType,
        key: &str,
    ) -> Result<Option<EntityRecord>, StoreError>;

    /// Records matching `predicate`, ordered by display name then key.
    async fn query(
        &self,
        entity_type: &EntityType,
        predicate: &StorePredicate,
        window: QueryWindow,
    ) -> Result<Vec<EntityRecord>, StoreError>;

    /// Insert or replace every record in one transaction.
    ///
    /// `first_seen_at` of existing rows is kept; `last_updated_at` becomes
    /// `now`. Returns the records as stored.
    async fn upsert(
        &self,
        entity_type: &EntityType,
        records: Vec<EntityRecord>,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntityRecord>, StoreError>;

    async fn count(&self, entity_type: &EntityType) -> Result<u64, StoreError>;

    /// Bytes of stored payload and attribute data for one entity type.
    async fn size_bytes(&self, entity_type: &EntityType) -> Result<u64, StoreError>;

    /// Most recent `last_updated_at` among provider-sourced records.
    async fn last_provider_update(
        &self,
        entity_type: &EntityType,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}
