//! Deciding what a failed remote branch means for a fetch.
//!
//! Nothing here retries. A failure either degrades the fetch to the local
//! result or, when there is no local result to stand on, becomes the error.

use grimoire_domain::EntityType;

use super::error::CacheError;
use crate::infrastructure::ports::ProviderError;

/// Why the remote branch produced no records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    Provider(ProviderError),
    /// The caller cancelled the fetch.
    Cancelled,
    /// The fetch deadline elapsed before the drain finished.
    DeadlineExceeded,
}

/// What to do with the local result after a remote failure.
#[derive(Debug)]
pub enum Degradation {
    /// Serve the local result as `CacheOnly` with `partial = true`.
    ServeLocal,
    /// No local fallback: surface the error.
    Fail(CacheError),
}

/// Classify a remote failure given how many rows the local branch found.
pub fn degrade(entity_type: &EntityType, failure: RemoteFailure, local_rows: usize) -> Degradation {
    match failure {
        RemoteFailure::Cancelled | RemoteFailure::DeadlineExceeded => {
            tracing::warn!(
                entity_type = %entity_type,
                reason = ?failure,
                local_rows,
                "Remote fetch abandoned, serving cached records"
            );
            Degradation::ServeLocal
        }
        RemoteFailure::Provider(ProviderError::Network(message)) => {
            if local_rows == 0 {
                return Degradation::Fail(CacheError::ProviderNetwork(message));
            }
            tracing::warn!(
                entity_type = %entity_type,
                error = %message,
                local_rows,
                "Provider unreachable, serving cached records"
            );
            Degradation::ServeLocal
        }
        RemoteFailure::Provider(ProviderError::RateLimited { retry_after }) => {
            if local_rows == 0 {
                let error = ProviderError::RateLimited { retry_after };
                return Degradation::Fail(CacheError::ProviderNetwork(error.to_string()));
            }
            tracing::warn!(
                entity_type = %entity_type,
                retry_after_secs = ?retry_after.map(|d| d.as_secs()),
                local_rows,
                "Provider rate limited, serving cached records"
            );
            Degradation::ServeLocal
        }
        RemoteFailure::Provider(ProviderError::Permanent(message)) => {
            if local_rows == 0 {
                tracing::error!(
                    entity_type = %entity_type,
                    error = %message,
                    "Provider rejected request and nothing is cached"
                );
                return Degradation::Fail(CacheError::ProviderPermanent(message));
            }
            tracing::warn!(
                entity_type = %entity_type,
                error = %message,
                local_rows,
                "Provider rejected request, serving cached records"
            );
            Degradation::ServeLocal
        }
    }
}
