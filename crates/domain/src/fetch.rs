//! Fetch results and cache statistics returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EntityRecord;
use crate::value_objects::EntityType;

/// Which sources contributed to a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Every returned record came from the provider in this call.
    Fresh,
    /// The provider was not used; records come from the local store only.
    CacheOnly,
    /// Provider records merged with local-only records.
    Merged,
}

/// Ordered records plus where they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    pub records: Vec<EntityRecord>,
    pub provenance: Provenance,
    /// True when one source failed and the other still produced the result.
    pub partial: bool,
}

impl FetchResult {
    /// The no-results answer for filters that cannot match anything.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            provenance: Provenance::CacheOnly,
            partial: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Point-in-time statistics for one entity type. Recomputed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entity_type: EntityType,
    pub record_count: u64,
    /// Bytes of stored payload and attribute data for this type.
    pub store_bytes: u64,
    pub last_remote_sync: Option<DateTime<Utc>>,
}
