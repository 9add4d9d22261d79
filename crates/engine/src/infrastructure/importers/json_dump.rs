//! Offline JSON dump importer.
//!
//! A dump is a directory holding one `<entity_type>.json` file per type, each
//! either a bare array of documents or a provider listing with `results`.

use chrono::{DateTime, Utc};
use grimoire_domain::{normalize_item, EntityRecord, EntitySchema, RecordOrigin};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;

use crate::infrastructure::ports::ImportError;

/// Documents read from one dump file, already normalized.
#[derive(Debug)]
pub struct TypeDump {
    pub file_name: String,
    pub records: Vec<EntityRecord>,
    /// Documents without a usable key.
    pub skipped: usize,
}

/// Per-type outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportTypeReport {
    pub entity_type: String,
    pub applied: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// Outcome of a whole dump import, ordered by entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub types: Vec<ImportTypeReport>,
}

impl ImportReport {
    pub fn applied(&self) -> usize {
        self.types.iter().map(|t| t.applied).sum()
    }

    pub fn rejected(&self) -> usize {
        self.types.iter().map(|t| t.rejected).sum()
    }

    pub fn skipped(&self) -> usize {
        self.types.iter().map(|t| t.skipped).sum()
    }
}

/// Reads dump files and normalizes their documents.
pub struct JsonDumpImporter {
    dump_dir: PathBuf,
    batch_size: usize,
}

impl JsonDumpImporter {
    pub fn new(dump_dir: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            dump_dir: dump_dir.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Number of records handed to the bulk writer at a time.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fail early when the dump directory is missing.
    pub async fn validate(&self) -> Result<(), ImportError> {
        match fs::metadata(&self.dump_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(ImportError::DirectoryNotFound(self.dump_dir.clone())),
        }
    }

    /// Read and normalize the dump file for `schema`'s entity type.
    ///
    /// Returns `Ok(None)` when the dump has no file for this type.
    pub async fn read_type(
        &self,
        schema: &EntitySchema,
        now: DateTime<Utc>,
    ) -> Result<Option<TypeDump>, ImportError> {
        let file_name = format!("{}.json", schema.entity_type);
        let path = self.dump_dir.join(&file_name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|source| ImportError::Io {
            path: path.clone(),
            source,
        })?;
        let document: Value = serde_json::from_str(&content).map_err(|source| ImportError::Json {
            path: path.clone(),
            source,
        })?;
        let items = documents(document).ok_or_else(|| ImportError::UnexpectedShape(path.clone()))?;

        let mut records = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            match normalize_item(schema, item, RecordOrigin::Import, &file_name, now) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        file = %file_name,
                        error = %e,
                        "Skipping dump item without a usable key"
                    );
                }
            }
        }

        tracing::debug!(
            file = %file_name,
            records = records.len(),
            skipped,
            "Read dump file"
        );

        Ok(Some(TypeDump {
            file_name,
            records,
            skipped,
        }))
    }
}

fn documents(document: Value) -> Option<Vec<Value>> {
    match document {
        Value::Array(items) => Some(items),
        Value::Object(mut listing) => match listing.remove("results") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use grimoire_domain::SchemaRegistry;
    use serde_json::json;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().expect("valid time")
    }

    fn write(dir: &TempDir, name: &str, body: &Value) {
        std::fs::write(dir.path().join(name), body.to_string()).expect("write dump file");
    }

    #[tokio::test]
    async fn reads_bare_arrays_and_listings() {
        let dir = TempDir::new().expect("temp dir");
        write(
            &dir,
            "spells.json",
            &json!([
                {"slug": "fireball", "name": "Fireball", "level_int": 3},
                {"name": "Nameless"}
            ]),
        );
        write(
            &dir,
            "creatures.json",
            &json!({"count": 1, "results": [{"slug": "goblin", "name": "Goblin", "challenge_rating": "1/4"}]}),
        );

        let registry = SchemaRegistry::srd_defaults();
        let importer = JsonDumpImporter::new(dir.path(), 100);

        let spells = importer
            .read_type(registry.resolve("spells").expect("schema"), now())
            .await
            .expect("read spells")
            .expect("spells file present");
        assert_eq!(spells.records.len(), 1);
        assert_eq!(spells.skipped, 1);
        assert_eq!(spells.records[0].origin, RecordOrigin::Import);
        assert_eq!(spells.records[0].origin_id, "spells.json");

        let creatures = importer
            .read_type(registry.resolve("creatures").expect("schema"), now())
            .await
            .expect("read creatures")
            .expect("creatures file present");
        assert_eq!(creatures.records[0].key, "goblin");
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = TempDir::new().expect("temp dir");
        let registry = SchemaRegistry::srd_defaults();
        let importer = JsonDumpImporter::new(dir.path(), 100);

        let feats = importer
            .read_type(registry.resolve("feats").expect("schema"), now())
            .await
            .expect("read feats");
        assert!(feats.is_none());
    }

    #[tokio::test]
    async fn unexpected_shape_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        write(&dir, "spells.json", &json!({"spells": []}));
        let registry = SchemaRegistry::srd_defaults();

        let err = JsonDumpImporter::new(dir.path(), 100)
            .read_type(registry.resolve("spells").expect("schema"), now())
            .await
            .expect_err("not a listing");
        assert!(matches!(err, ImportError::UnexpectedShape(_)));
    }

    #[tokio::test]
    async fn missing_directory_fails_validation() {
        let dir = TempDir::new().expect("temp dir");
        let importer = JsonDumpImporter::new(dir.path().join("absent"), 100);
        assert!(matches!(
            importer.validate().await,
            Err(ImportError::DirectoryNotFound(_))
        ));
    }
}
