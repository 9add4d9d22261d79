//! Content cache service: the caller-facing operations.

use grimoire_domain::{CacheStats, EntityRecord, EntityType, FetchResult, FilterSpec, SchemaRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::bulk_writer::{BatchOutcome, BulkWriter};
use super::error::CacheError;
use super::fetch::{FetchOrchestrator, FetchRequest, FetchSettings};
use super::filter_compiler::FilterCompiler;
use super::stats::{collect_stats, SyncLog};
use crate::infrastructure::importers::{ImportReport, ImportTypeReport, JsonDumpImporter};
use crate::infrastructure::ports::{ClockPort, ContentProvider, EntityStore};

/// Fetch, upsert, lookup, stats and import over one entity store.
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn EntityStore>,
    registry: Arc<SchemaRegistry>,
    clock: Arc<dyn ClockPort>,
    writer: BulkWriter,
    orchestrator: FetchOrchestrator,
    sync_log: Arc<SyncLog>,
}

impl ContentCache {
    pub fn new(
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn ContentProvider>,
        clock: Arc<dyn ClockPort>,
        registry: Arc<SchemaRegistry>,
        settings: FetchSettings,
    ) -> Self {
        let sync_log = Arc::new(SyncLog::new());
        let writer = BulkWriter::new(store.clone(), clock.clone(), registry.clone());
        let orchestrator = FetchOrchestrator::new(
            store.clone(),
            provider,
            FilterCompiler::new(registry.clone()),
            writer.clone(),
            clock.clone(),
            sync_log.clone(),
            settings,
        );

        Self {
            store,
            registry,
            clock,
            writer,
            orchestrator,
            sync_log,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn entity_type(&self, name: &str) -> Result<EntityType, CacheError> {
        Ok(self.registry.resolve(name)?.entity_type.clone())
    }

    /// Fetch with no cancellation beyond the configured deadline.
    pub async fn fetch(
        &self,
        entity_type: &str,
        filters: FilterSpec,
        limit: u32,
        offset: u32,
    ) -> Result<FetchResult, CacheError> {
        let request = FetchRequest::new(entity_type, filters, limit, offset);
        self.orchestrator
            .fetch(&request, &CancellationToken::new())
            .await
    }

    pub async fn fetch_with(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, CacheError> {
        self.orchestrator.fetch(request, cancel).await
    }

    /// Upsert a caller-supplied batch. Invalid records come back in
    /// `rejected`; the rest are applied atomically.
    pub async fn upsert_batch(
        &self,
        entity_type: &str,
        records: Vec<EntityRecord>,
    ) -> Result<BatchOutcome, CacheError> {
        let entity_type = self.entity_type(entity_type)?;
        Ok(self.writer.upsert(&entity_type, records).await?)
    }

    /// One cached record by key. Never consults the provider.
    pub async fn get(&self, entity_type: &str, key: &str) -> Result<Option<EntityRecord>, CacheError> {
        let entity_type = self.entity_type(entity_type)?;
        Ok(self.store.get(&entity_type, key).await?)
    }

    pub async fn stats(&self, entity_type: &str) -> Result<CacheStats, CacheError> {
        let entity_type = self.entity_type(entity_type)?;
        Ok(collect_stats(self.store.as_ref(), &self.sync_log, &entity_type).await?)
    }

    /// Load an offline dump through the bulk writer, one entity type at a time.
    pub async fn import_dump(&self, importer: &JsonDumpImporter) -> Result<ImportReport, CacheError> {
        importer.validate().await?;

        let mut schemas: Vec<_> = self
            .registry
            .entity_types()
            .filter_map(|entity_type| self.registry.get(entity_type))
            .collect();
        schemas.sort_by(|a, b| a.entity_type.as_str().cmp(b.entity_type.as_str()));

        let mut report = ImportReport::default();
        for schema in schemas {
            let Some(dump) = importer.read_type(schema, self.clock.now()).await? else {
                continue;
            };

            let mut type_report = ImportTypeReport {
                entity_type: schema.entity_type.to_string(),
                skipped: dump.skipped,
                ..Default::default()
            };
            let mut records = dump.records.into_iter().peekable();
            while records.peek().is_some() {
                let batch: Vec<EntityRecord> = records.by_ref().take(importer.batch_size()).collect();
                let outcome = self.writer.upsert(&schema.entity_type, batch).await?;
                type_report.applied += outcome.applied_count();
                type_report.rejected += outcome.rejected.len();
            }

            tracing::info!(
                entity_type = %schema.entity_type,
                file = %dump.file_name,
                applied = type_report.applied,
                rejected = type_report.rejected,
                skipped = type_report.skipped,
                "Imported dump file"
            );
            report.types.push(type_report);
        }

        Ok(report)
    }
}
