//! Cache statistics and the last-sync table.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grimoire_domain::{CacheStats, EntityType};

use crate::infrastructure::ports::{EntityStore, StoreError};

/// In-memory record of the last successful remote sync per entity type.
///
/// Lost on restart; stats then fall back to the newest provider-origin row
/// in the store.
#[derive(Debug, Default)]
pub struct SyncLog {
    last_sync: DashMap<EntityType, DateTime<Utc>>,
}

impl SyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entity_type: &EntityType, at: DateTime<Utc>) {
        self.last_sync
            .entry(entity_type.clone())
            .and_modify(|last| {
                if at > *last {
                    *last = at;
                }
            })
            .or_insert(at);
    }

    pub fn last_sync(&self, entity_type: &EntityType) -> Option<DateTime<Utc>> {
        self.last_sync.get(entity_type).map(|entry| *entry.value())
    }
}

/// Recompute statistics for one entity type.
pub async fn collect_stats(
    store: &dyn EntityStore,
    sync_log: &SyncLog,
    entity_type: &EntityType,
) -> Result<CacheStats, StoreError> {
    let record_count = store.count(entity_type).await?;
    let store_bytes = store.size_bytes(entity_type).await?;
    let last_remote_sync = match sync_log.last_sync(entity_type) {
        Some(at) => Some(at),
        None => store.last_provider_update(entity_type).await?,
    };

    Ok(CacheStats {
        entity_type: entity_type.clone(),
        record_count,
        store_bytes,
        last_remote_sync,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::MockEntityStore;
    use chrono::TimeZone;

    fn spells() -> EntityType {
        EntityType::new("spells").expect("valid entity type")
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, hour, 0, 0).single().expect("valid time")
    }

    #[test]
    fn sync_log_keeps_the_latest_time() {
        let log = SyncLog::new();
        log.record(&spells(), at(5));
        log.record(&spells(), at(3));
        assert_eq!(log.last_sync(&spells()), Some(at(5)));
    }

    #[tokio::test]
    async fn stats_prefer_the_sync_log() {
        let mut store = MockEntityStore::new();
        store.expect_count().returning(|_| Ok(12));
        store.expect_size_bytes().returning(|_| Ok(4096));
        store.expect_last_provider_update().times(0);

        let log = SyncLog::new();
        log.record(&spells(), at(7));

        let stats = collect_stats(&store, &log, &spells()).await.expect("stats");
        assert_eq!(stats.record_count, 12);
        assert_eq!(stats.store_bytes, 4096);
        assert_eq!(stats.last_remote_sync, Some(at(7)));
    }

    #[tokio::test]
    async fn stats_fall_back_to_stored_provider_rows() {
        let mut store = MockEntityStore::new();
        store.expect_count().returning(|_| Ok(1));
        store.expect_size_bytes().returning(|_| Ok(10));
        store
            .expect_last_provider_update()
            .times(1)
            .returning(|_| Ok(Some(at(2))));

        let stats = collect_stats(&store, &SyncLog::new(), &spells())
            .await
            .expect("stats");
        assert_eq!(stats.last_remote_sync, Some(at(2)));
    }
}
