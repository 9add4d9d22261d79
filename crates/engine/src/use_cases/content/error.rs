//! Caller-facing cache errors.

use grimoire_domain::DomainError;

use crate::infrastructure::ports::{ImportError, StoreError};

/// Errors surfaced by fetch, upsert and stats operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Unknown entity type or field, unsupported operator, malformed value.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Entity store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Provider unreachable (or rate limited) and no local rows to fall back on.
    #[error("Provider unreachable: {0}")]
    ProviderNetwork(String),

    /// Provider rejected the request and no local rows to fall back on.
    #[error("Provider error: {0}")]
    ProviderPermanent(String),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),
}

impl From<DomainError> for CacheError {
    fn from(error: DomainError) -> Self {
        CacheError::InvalidFilter(error.to_string())
    }
}
