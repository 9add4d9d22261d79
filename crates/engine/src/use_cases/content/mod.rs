//! Content cache use cases.
//!
//! Filter compilation, batch writes, fetch orchestration with graceful
//! degradation, and statistics over the entity store.

mod bulk_writer;
mod cache_service;
mod error;
mod fetch;
mod filter_compiler;
mod merge;
mod resilience;
mod stats;

pub use bulk_writer::{BatchOutcome, BulkWriter};
pub use cache_service::ContentCache;
pub use error::CacheError;
pub use fetch::{FetchOrchestrator, FetchRequest, FetchSettings, DEFAULT_MAX_PAGES};
pub use filter_compiler::{CompiledFilter, FilterCompiler};
pub use resilience::{degrade, Degradation, RemoteFailure};
pub use stats::{collect_stats, SyncLog};
