//! Remote content provider port.

use async_trait::async_trait;
use grimoire_domain::{EntityType, FilterSpec};

use super::error::ProviderError;

/// One page of raw provider documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderPage {
    pub items: Vec<serde_json::Value>,
    /// Continuation token for the next page; `None` when drained.
    pub next_page: Option<String>,
}

/// A paginated remote source of content documents.
///
/// Implementations translate the filter into their own query dialect and make
/// exactly one request per call. Draining pages is the caller's job, and so is
/// any retry policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn fetch_page(
        &self,
        entity_type: &EntityType,
        filters: &FilterSpec,
        page_token: Option<String>,
    ) -> Result<ProviderPage, ProviderError>;

    /// Identifier recorded as `origin_id` on records from this provider.
    fn origin_id(&self) -> String;
}
