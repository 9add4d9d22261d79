//! Fetch orchestration: local query and remote drain side by side.

use grimoire_domain::{
    normalize_item, EntityRecord, EntitySchema, EntityType, FetchResult, FilterSpec, Provenance,
    RecordOrigin,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::bulk_writer::BulkWriter;
use super::error::CacheError;
use super::filter_compiler::{CompiledFilter, FilterCompiler};
use super::merge::{merge_remote_first, window};
use super::resilience::{degrade, Degradation, RemoteFailure};
use super::stats::SyncLog;
use crate::infrastructure::ports::{
    ClockPort, ContentProvider, EntityStore, ProviderError, QueryWindow, StoreError,
};

/// Default cap on pages drained per fetch.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Knobs for the remote branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Stop draining after this many pages.
    pub max_pages: u32,
    /// Abandon the remote branch after this long.
    pub deadline: Option<Duration>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            deadline: None,
        }
    }
}

/// One caller request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub entity_type: String,
    pub filters: FilterSpec,
    pub limit: u32,
    pub offset: u32,
}

impl FetchRequest {
    pub fn new(entity_type: impl Into<String>, filters: FilterSpec, limit: u32, offset: u32) -> Self {
        Self {
            entity_type: entity_type.into(),
            filters,
            limit,
            offset,
        }
    }
}

/// Runs fetches against the store and the provider.
#[derive(Clone)]
pub struct FetchOrchestrator {
    store: Arc<dyn EntityStore>,
    provider: Arc<dyn ContentProvider>,
    compiler: FilterCompiler,
    writer: BulkWriter,
    clock: Arc<dyn ClockPort>,
    sync_log: Arc<SyncLog>,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn ContentProvider>,
        compiler: FilterCompiler,
        writer: BulkWriter,
        clock: Arc<dyn ClockPort>,
        sync_log: Arc<SyncLog>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            store,
            provider,
            compiler,
            writer,
            clock,
            sync_log,
            settings,
        }
    }

    /// Fetch records for `request`.
    ///
    /// Cancelling `cancel` abandons the remote branch; pages drained so far
    /// are dropped and the local result is served.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, CacheError> {
        let schema = self.compiler.schema(&request.entity_type)?;
        let entity_type = &schema.entity_type;
        let compiled = self.compiler.compile(entity_type, &request.filters)?;

        if compiled.is_match_nothing() {
            tracing::debug!(entity_type = %entity_type, "Empty set filter, nothing to fetch");
            return Ok(FetchResult::empty());
        }

        let local = self.local_branch(&compiled, entity_type, request);
        let remote = self.remote_branch(schema, &request.filters, cancel);
        let (local, remote) = tokio::join!(local, remote);

        let local = local.map_err(|e| {
            tracing::error!(entity_type = %entity_type, error = %e, "Local query failed");
            CacheError::StoreUnavailable(e)
        })?;

        match remote {
            Ok(remote) => {
                let outcome = self.writer.upsert(entity_type, remote).await.map_err(|e| {
                    tracing::error!(entity_type = %entity_type, error = %e, "Persisting provider records failed");
                    CacheError::StoreUnavailable(e)
                })?;
                self.sync_log.record(entity_type, self.clock.now());

                let remote = self
                    .matching_remote(&compiled, entity_type, &outcome.applied, request)
                    .await
                    .map_err(|e| {
                        tracing::error!(entity_type = %entity_type, error = %e, "Reading back provider records failed");
                        CacheError::StoreUnavailable(e)
                    })?;

                // Local rows the provider just replaced are superseded even
                // when the new version no longer matches.
                let replaced: HashSet<&str> =
                    outcome.applied.iter().map(|r| r.key.as_str()).collect();
                let local: Vec<EntityRecord> = local
                    .into_iter()
                    .filter(|r| !replaced.contains(r.key.as_str()))
                    .collect();

                tracing::info!(
                    entity_type = %entity_type,
                    applied = outcome.applied_count(),
                    matched = remote.len(),
                    rejected = outcome.rejected.len(),
                    local = local.len(),
                    "Synced from provider"
                );

                let (records, provenance) =
                    merge_remote_first(local, remote, request.limit, request.offset);
                Ok(FetchResult {
                    records,
                    provenance,
                    partial: false,
                })
            }
            Err(failure) => match degrade(entity_type, failure, local.len()) {
                Degradation::ServeLocal => Ok(FetchResult {
                    records: window(local, request.limit, request.offset),
                    provenance: Provenance::CacheOnly,
                    partial: true,
                }),
                Degradation::Fail(error) => Err(error),
            },
        }
    }

    async fn local_branch(
        &self,
        compiled: &CompiledFilter,
        entity_type: &EntityType,
        request: &FetchRequest,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        // Merging happens before paging, so read everything up to the window end.
        let window = QueryWindow::through(request.limit, request.offset);
        compiled.execute(self.store.as_ref(), entity_type, window).await
    }

    /// Evaluate the caller's filter over the provider records just stored.
    async fn matching_remote(
        &self,
        compiled: &CompiledFilter,
        entity_type: &EntityType,
        applied: &[EntityRecord],
        request: &FetchRequest,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        if applied.is_empty() {
            return Ok(Vec::new());
        }
        let window = QueryWindow::through(request.limit, request.offset);
        compiled
            .restricted_to_keys(applied.iter().map(|r| r.key.clone()))
            .execute(self.store.as_ref(), entity_type, window)
            .await
    }

    async fn remote_branch(
        &self,
        schema: &EntitySchema,
        filters: &FilterSpec,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntityRecord>, RemoteFailure> {
        let deadline = async {
            match self.settings.deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RemoteFailure::Cancelled),
            _ = deadline => Err(RemoteFailure::DeadlineExceeded),
            drained = self.drain(schema, filters) => drained.map_err(RemoteFailure::Provider),
        }
    }

    /// Drain pages sequentially, normalizing each page as it arrives.
    async fn drain(
        &self,
        schema: &EntitySchema,
        filters: &FilterSpec,
    ) -> Result<Vec<EntityRecord>, ProviderError> {
        let entity_type = &schema.entity_type;
        let origin_id = self.provider.origin_id();
        let mut records = Vec::new();
        let mut page_token = None;
        let mut pages = 0u32;

        loop {
            let page = self
                .provider
                .fetch_page(entity_type, filters, page_token.take())
                .await?;
            pages += 1;

            let now = self.clock.now();
            let mut skipped = 0usize;
            for item in page.items {
                match normalize_item(schema, item, RecordOrigin::Provider, &origin_id, now) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        skipped += 1;
                        tracing::warn!(entity_type = %entity_type, error = %e, "Skipping provider item");
                    }
                }
            }
            tracing::debug!(
                entity_type = %entity_type,
                page = pages,
                total = records.len(),
                skipped,
                "Drained provider page"
            );

            match page.next_page {
                Some(_) if pages >= self.settings.max_pages => {
                    tracing::warn!(
                        entity_type = %entity_type,
                        max_pages = self.settings.max_pages,
                        "Stopping provider drain at page limit"
                    );
                    break;
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(records)
    }
}
