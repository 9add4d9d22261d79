//! SQLite schema for the entity store.
//!
//! `records` holds one row per `(entity_type, key)` with the canonical payload.
//! `record_attributes` holds the promoted attributes, one row each, so every
//! filterable field gets exact, folded and numeric indexes.

pub(super) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS records (
        entity_type TEXT NOT NULL,
        key TEXT NOT NULL,
        key_folded TEXT NOT NULL,
        display_name TEXT NOT NULL,
        display_name_folded TEXT NOT NULL,
        attributes_json TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        origin TEXT NOT NULL,
        origin_id TEXT NOT NULL,
        first_seen_at TEXT NOT NULL,
        last_updated_at TEXT NOT NULL,
        PRIMARY KEY (entity_type, key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_records_order ON records (entity_type, display_name, key)",
    "CREATE INDEX IF NOT EXISTS idx_records_key_folded ON records (entity_type, key_folded)",
    "CREATE INDEX IF NOT EXISTS idx_records_name_folded ON records (entity_type, display_name_folded)",
    "CREATE INDEX IF NOT EXISTS idx_records_origin ON records (entity_type, origin, last_updated_at)",
    r#"
    CREATE TABLE IF NOT EXISTS record_attributes (
        entity_type TEXT NOT NULL,
        record_key TEXT NOT NULL,
        name TEXT NOT NULL,
        value_text TEXT NOT NULL,
        value_folded TEXT NOT NULL,
        value_num REAL,
        PRIMARY KEY (entity_type, record_key, name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attributes_text ON record_attributes (entity_type, name, value_text)",
    "CREATE INDEX IF NOT EXISTS idx_attributes_folded ON record_attributes (entity_type, name, value_folded)",
    "CREATE INDEX IF NOT EXISTS idx_attributes_num ON record_attributes (entity_type, name, value_num)",
];
