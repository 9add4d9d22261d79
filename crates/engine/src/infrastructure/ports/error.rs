//! Error types for port operations.

use std::time::Duration;

/// Entity store errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// A stored row could not be decoded back into a record.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    /// Create a Serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }
}

/// Failures of a single provider request, classified by what the caller
/// can do about them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Connection refused, DNS failure, timeout, 5xx: the provider is unreachable.
    #[error("Provider unreachable: {0}")]
    Network(String),

    /// The provider asked us to slow down.
    #[error("Provider rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Malformed response, unexpected schema, rejected request.
    #[error("Provider rejected request: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn network(message: impl ToString) -> Self {
        Self::Network(message.to_string())
    }

    pub fn permanent(message: impl ToString) -> Self {
        Self::Permanent(message.to_string())
    }
}

/// Errors from offline imports.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Import directory not found: {0}")]
    DirectoryNotFound(std::path::PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected document shape in {0}: expected an array or an object with 'results'")]
    UnexpectedShape(std::path::PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),
}
