//! SQLite-backed entity store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use grimoire_domain::{fold_case, EntityRecord, EntityType, RecordOrigin, ScalarValue};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;

use super::predicate::{numeric_value, push_predicate};
use super::schema::SCHEMA;
use crate::infrastructure::ports::{EntityStore, QueryWindow, StoreError, StorePredicate};

/// Connections in the pool for file-backed stores.
const MAX_CONNECTIONS: u32 = 8;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_RECORDS: &str = "SELECT r.entity_type, r.key, r.display_name, r.attributes_json, \
     r.payload_json, r.origin, r.origin_id, r.first_seen_at, r.last_updated_at \
     FROM records r WHERE r.entity_type = ";

/// SQLite implementation of the entity store.
///
/// Opened and closed explicitly; hand the same instance to everything that
/// needs it. Readers run alongside the writer (WAL); the write gate
/// serializes batch transactions inside this process.
pub struct SqliteEntityStore {
    pool: SqlitePool,
    write_gate: Mutex<()>,
}

impl SqliteEntityStore {
    /// Open (creating if needed) a store backed by the file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::database("open", e))?;

        let store = Self::initialize(pool).await?;
        tracing::info!(path = %path.display(), "Opened entity store");
        Ok(store)
    }

    /// Open a private in-memory store (one connection, lives until closed).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::database("open", e))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::database("open", e))?;

        Self::initialize(pool).await
    }

    async fn initialize(pool: SqlitePool) -> Result<Self, StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::database("initialize_schema", e))?;
        }

        Ok(Self {
            pool,
            write_gate: Mutex::new(()),
        })
    }

    /// Close every pooled connection. Later calls fail with a database error.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Closed entity store");
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn get(
        &self,
        entity_type: &EntityType,
        key: &str,
    ) -> Result<Option<EntityRecord>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_RECORDS);
        qb.push_bind(entity_type.to_string());
        qb.push(" AND r.key = ");
        qb.push_bind(key.to_string());

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::database("get", e))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn query(
        &self,
        entity_type: &EntityType,
        predicate: &StorePredicate,
        window: QueryWindow,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_RECORDS);
        qb.push_bind(entity_type.to_string());
        push_predicate(&mut qb, entity_type.as_str(), predicate);
        qb.push(" ORDER BY r.display_name, r.key LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(window.offset));

        tracing::debug!(
            entity_type = %entity_type,
            conditions = predicate.conditions().len(),
            sql = qb.sql(),
            "Querying entity store"
        );

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::database("query", e))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn upsert(
        &self,
        entity_type: &EntityType,
        records: Vec<EntityRecord>,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        if records.is_empty() {
            return Ok(records);
        }

        let now_text = timestamp(now);
        let _gate = self.write_gate.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database("upsert", e))?;

        let mut stored = Vec::with_capacity(records.len());
        for mut record in records {
            let attributes_json = serde_json::to_string(&record.attributes)
                .map_err(StoreError::serialization)?;
            let payload_json =
                serde_json::to_string(&record.payload).map_err(StoreError::serialization)?;

            let first_seen: String = sqlx::query_scalar(
                r#"
                INSERT INTO records (
                    entity_type, key, key_folded, display_name, display_name_folded,
                    attributes_json, payload_json, origin, origin_id,
                    first_seen_at, last_updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(entity_type, key) DO UPDATE SET
                    display_name = excluded.display_name,
                    display_name_folded = excluded.display_name_folded,
                    attributes_json = excluded.attributes_json,
                    payload_json = excluded.payload_json,
                    origin = excluded.origin,
                    origin_id = excluded.origin_id,
                    last_updated_at = excluded.last_updated_at
                RETURNING first_seen_at
                "#,
            )
            .bind(entity_type.as_str())
            .bind(&record.key)
            .bind(fold_case(&record.key))
            .bind(&record.display_name)
            .bind(fold_case(&record.display_name))
            .bind(attributes_json)
            .bind(payload_json)
            .bind(record.origin.as_str())
            .bind(&record.origin_id)
            .bind(&now_text)
            .bind(&now_text)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::database("upsert", e))?;

            sqlx::query("DELETE FROM record_attributes WHERE entity_type = ? AND record_key = ?")
                .bind(entity_type.as_str())
                .bind(&record.key)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::database("upsert_attributes", e))?;

            for (name, value) in &record.attributes {
                sqlx::query(
                    r#"
                    INSERT INTO record_attributes (
                        entity_type, record_key, name, value_text, value_folded, value_num
                    )
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(entity_type.as_str())
                .bind(&record.key)
                .bind(name)
                .bind(value.to_text())
                .bind(value.folded())
                .bind(numeric_value(value))
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::database("upsert_attributes", e))?;
            }

            record.entity_type = entity_type.clone();
            record.first_seen_at = parse_timestamp(&first_seen)?;
            record.last_updated_at = now;
            stored.push(record);
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::database("upsert_commit", e))?;

        Ok(stored)
    }

    async fn count(&self, entity_type: &EntityType) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE entity_type = ?")
            .bind(entity_type.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::database("count", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn size_bytes(&self, entity_type: &EntityType) -> Result<u64, StoreError> {
        let records: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(
                LENGTH(CAST(payload_json AS BLOB)) + LENGTH(CAST(attributes_json AS BLOB))
            ), 0)
            FROM records WHERE entity_type = ?
            "#,
        )
        .bind(entity_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::database("size_bytes", e))?;

        let attributes: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(
                LENGTH(CAST(value_text AS BLOB)) + LENGTH(CAST(value_folded AS BLOB))
            ), 0)
            FROM record_attributes WHERE entity_type = ?
            "#,
        )
        .bind(entity_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::database("size_bytes", e))?;

        Ok(u64::try_from(records.saturating_add(attributes)).unwrap_or_default())
    }

    async fn last_provider_update(
        &self,
        entity_type: &EntityType,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let latest: Option<String> = sqlx::query_scalar(
            "SELECT MAX(last_updated_at) FROM records WHERE entity_type = ? AND origin = ?",
        )
        .bind(entity_type.as_str())
        .bind(RecordOrigin::Provider.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::database("last_provider_update", e))?;

        latest.as_deref().map(parse_timestamp).transpose()
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::serialization(format!("bad timestamp '{}': {}", text, e)))
}

fn row_to_record(row: &SqliteRow) -> Result<EntityRecord, StoreError> {
    let column = |name: &str| -> Result<String, StoreError> {
        row.try_get::<String, _>(name)
            .map_err(|e| StoreError::serialization(format!("column {}: {}", name, e)))
    };

    let entity_type =
        EntityType::new(column("entity_type")?).map_err(StoreError::serialization)?;
    let attributes: BTreeMap<String, ScalarValue> =
        serde_json::from_str(&column("attributes_json")?).map_err(StoreError::serialization)?;
    let payload = serde_json::from_str(&column("payload_json")?).map_err(StoreError::serialization)?;
    let origin = RecordOrigin::from_str(&column("origin")?).map_err(StoreError::serialization)?;

    Ok(EntityRecord {
        entity_type,
        key: column("key")?,
        display_name: column("display_name")?,
        attributes,
        payload,
        origin,
        origin_id: column("origin_id")?,
        first_seen_at: parse_timestamp(&column("first_seen_at")?)?,
        last_updated_at: parse_timestamp(&column("last_updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{Column, Comparison, Condition};
    use chrono::TimeZone;
    use grimoire_domain::AttributeKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn spells() -> EntityType {
        EntityType::new("spells").expect("valid entity type")
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).single().expect("valid time")
    }

    fn spell(key: &str, name: &str, level: i64, school: &str) -> EntityRecord {
        EntityRecord::new(
            spells(),
            key,
            name,
            json!({"slug": key, "name": name, "level_int": level, "school": school}),
            RecordOrigin::Provider,
            "open5e",
            at(0),
        )
        .with_attribute("level", level)
        .with_attribute("school", school)
    }

    async fn open_temp() -> (TempDir, SqliteEntityStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = SqliteEntityStore::open(dir.path().join("grimoire.db"))
            .await
            .expect("open store");
        (dir, store)
    }

    async fn seed(store: &SqliteEntityStore) {
        store
            .upsert(
                &spells(),
                vec![
                    spell("fireball", "Fireball", 3, "Evocation"),
                    spell("fire-bolt", "Fire Bolt", 0, "Evocation"),
                    spell("shield", "Shield", 1, "Abjuration"),
                    spell("cone-of-cold", "Cone of Cold", 5, "Evocation"),
                ],
                at(1),
            )
            .await
            .expect("seed spells");
    }

    fn keys(records: &[EntityRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.as_str()).collect()
    }

    fn all() -> QueryWindow {
        QueryWindow::new(100, 0)
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_the_record() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let fireball = store
            .get(&spells(), "fireball")
            .await
            .expect("get")
            .expect("fireball stored");

        assert_eq!(fireball.display_name, "Fireball");
        assert_eq!(fireball.attributes.get("level"), Some(&ScalarValue::Integer(3)));
        assert_eq!(fireball.payload["school"], json!("Evocation"));
        assert_eq!(fireball.first_seen_at, at(1));
        assert_eq!(fireball.last_updated_at, at(1));
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let (_dir, store) = open_temp().await;
        assert!(store.get(&spells(), "wish").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn reupsert_keeps_first_seen_and_moves_last_updated() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let mut changed = spell("fireball", "Fireball", 3, "Evocation");
        changed.payload = json!({"slug": "fireball", "name": "Fireball", "desc": "boom"});
        let stored = store
            .upsert(&spells(), vec![changed], at(5))
            .await
            .expect("second upsert");

        assert_eq!(stored[0].first_seen_at, at(1));
        assert_eq!(stored[0].last_updated_at, at(5));

        let reloaded = store
            .get(&spells(), "fireball")
            .await
            .expect("get")
            .expect("fireball stored");
        assert_eq!(reloaded.first_seen_at, at(1));
        assert_eq!(reloaded.last_updated_at, at(5));
        assert_eq!(reloaded.payload["desc"], json!("boom"));
        assert_eq!(store.count(&spells()).await.expect("count"), 4);
    }

    #[tokio::test]
    async fn upsert_replaces_attributes_wholesale() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let mut stripped = spell("shield", "Shield", 1, "Abjuration");
        stripped.attributes.remove("school");
        store
            .upsert(&spells(), vec![stripped], at(2))
            .await
            .expect("upsert");

        let predicate = StorePredicate::new(vec![Condition::new(
            Column::Attribute("school".to_string()),
            AttributeKind::Text,
            Comparison::Equals(ScalarValue::text("Abjuration")),
        )]);
        let rows = store.query(&spells(), &predicate, all()).await.expect("query");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn query_orders_by_display_name_then_key() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let rows = store
            .query(&spells(), &StorePredicate::all(), all())
            .await
            .expect("query");

        assert_eq!(keys(&rows), vec!["cone-of-cold", "fire-bolt", "fireball", "shield"]);
    }

    #[tokio::test]
    async fn query_applies_limit_and_offset() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let rows = store
            .query(&spells(), &StorePredicate::all(), QueryWindow::new(2, 1))
            .await
            .expect("query");

        assert_eq!(keys(&rows), vec!["fire-bolt", "fireball"]);
    }

    #[tokio::test]
    async fn numeric_range_conditions() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let predicate = StorePredicate::new(vec![
            Condition::new(
                Column::Attribute("level".to_string()),
                AttributeKind::Integer,
                Comparison::AtLeast(1.0),
            ),
            Condition::new(
                Column::Attribute("level".to_string()),
                AttributeKind::Integer,
                Comparison::AtMost(3.0),
            ),
        ]);

        let rows = store.query(&spells(), &predicate, all()).await.expect("query");
        assert_eq!(keys(&rows), vec!["fireball", "shield"]);
    }

    #[tokio::test]
    async fn folded_name_and_pattern_conditions() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let exact = StorePredicate::new(vec![Condition::new(
            Column::DisplayName,
            AttributeKind::Text,
            Comparison::EqualsFolded("fireball".to_string()),
        )]);
        let rows = store.query(&spells(), &exact, all()).await.expect("query");
        assert_eq!(keys(&rows), vec!["fireball"]);

        let prefix = StorePredicate::new(vec![Condition::new(
            Column::DisplayName,
            AttributeKind::Text,
            Comparison::Like("fire%".to_string()),
        )]);
        let rows = store.query(&spells(), &prefix, all()).await.expect("query");
        assert_eq!(keys(&rows), vec!["fire-bolt", "fireball"]);
    }

    #[tokio::test]
    async fn set_membership_on_attributes() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let predicate = StorePredicate::new(vec![Condition::new(
            Column::Attribute("level".to_string()),
            AttributeKind::Integer,
            Comparison::OneOf(vec![ScalarValue::Integer(0), ScalarValue::Integer(5)]),
        )]);

        let rows = store.query(&spells(), &predicate, all()).await.expect("query");
        assert_eq!(keys(&rows), vec!["cone-of-cold", "fire-bolt"]);
    }

    #[tokio::test]
    async fn entity_types_are_isolated() {
        let (_dir, store) = open_temp().await;
        seed(&store).await;

        let creatures = EntityType::new("creatures").expect("valid entity type");
        assert_eq!(store.count(&creatures).await.expect("count"), 0);
        assert!(store.get(&creatures, "fireball").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn concurrent_disjoint_batches_are_both_applied() {
        let (_dir, store) = open_temp().await;
        let first: Vec<_> = (0..25)
            .map(|i| spell(&format!("a-{i}"), &format!("A {i}"), 1, "Evocation"))
            .collect();
        let second: Vec<_> = (0..30)
            .map(|i| spell(&format!("b-{i}"), &format!("B {i}"), 2, "Illusion"))
            .collect();

        let ty = spells();
        let (a, b) = tokio::join!(
            store.upsert(&ty, first, at(1)),
            store.upsert(&ty, second, at(1)),
        );
        a.expect("first batch");
        b.expect("second batch");

        assert_eq!(store.count(&spells()).await.expect("count"), 55);
    }

    #[tokio::test]
    async fn stats_queries_reflect_stored_rows() {
        let (_dir, store) = open_temp().await;
        assert_eq!(store.size_bytes(&spells()).await.expect("size"), 0);
        assert!(store.last_provider_update(&spells()).await.expect("sync").is_none());

        seed(&store).await;

        assert!(store.size_bytes(&spells()).await.expect("size") > 0);
        assert_eq!(
            store.last_provider_update(&spells()).await.expect("sync"),
            Some(at(1))
        );
    }

    #[tokio::test]
    async fn in_memory_store_is_usable_until_closed() {
        let store = SqliteEntityStore::open_in_memory().await.expect("open");
        seed(&store).await;
        assert_eq!(store.count(&spells()).await.expect("count"), 4);

        store.close().await;
        assert!(matches!(
            store.count(&spells()).await,
            Err(StoreError::Database { .. })
        ));
    }
}
