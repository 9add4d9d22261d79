//! Merging local and remote results.

use grimoire_domain::{EntityRecord, Provenance};
use std::collections::BTreeMap;

/// Merge by key with remote precedence, order by display name then key, and
/// apply the caller's window.
///
/// Local-only records are kept. The result is independent of which branch
/// finished first.
pub fn merge_remote_first(
    local: Vec<EntityRecord>,
    remote: Vec<EntityRecord>,
    limit: u32,
    offset: u32,
) -> (Vec<EntityRecord>, Provenance) {
    let mut by_key: BTreeMap<String, (EntityRecord, bool)> = BTreeMap::new();
    for record in local {
        by_key.insert(record.key.clone(), (record, true));
    }
    for record in remote {
        by_key.insert(record.key.clone(), (record, false));
    }

    let mut merged: Vec<(EntityRecord, bool)> = by_key.into_values().collect();
    merged.sort_by(|(a, _), (b, _)| a.ordering_key().cmp(&b.ordering_key()));

    let window: Vec<(EntityRecord, bool)> = merged
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let provenance = if window.iter().any(|(_, local_only)| *local_only) {
        Provenance::Merged
    } else {
        Provenance::Fresh
    };

    (window.into_iter().map(|(record, _)| record).collect(), provenance)
}

/// Apply the caller's window to an already ordered local result.
pub fn window(records: Vec<EntityRecord>, limit: u32, offset: u32) -> Vec<EntityRecord> {
    records
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}
