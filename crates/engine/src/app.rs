//! Application state and composition.

use std::sync::Arc;

use grimoire_domain::SchemaRegistry;

use crate::infrastructure::{
    filter_aliases::FilterAliases,
    ports::{ClockPort, ContentProvider, EntityStore},
};
use crate::use_cases::content::{ContentCache, FetchSettings};

/// Main application state.
///
/// Passed to HTTP handlers via Axum state.
pub struct App {
    pub content: ContentCache,
    pub aliases: FilterAliases,
    pub clock: Arc<dyn ClockPort>,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn ContentProvider>,
        clock: Arc<dyn ClockPort>,
        registry: Arc<SchemaRegistry>,
        aliases: FilterAliases,
        settings: FetchSettings,
    ) -> Self {
        let content = ContentCache::new(store, provider, clock.clone(), registry, settings);
        Self {
            content,
            aliases,
            clock,
        }
    }
}
