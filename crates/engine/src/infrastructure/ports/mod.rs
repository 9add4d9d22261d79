//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - The entity store (SQLite today)
//! - The remote content provider (HTTP today)
//! - Clock (for testing)

mod error;
mod provider;
mod store;
mod testing;
pub mod types;

pub use error::{ImportError, ProviderError, StoreError};
pub use provider::{ContentProvider, ProviderPage};
pub use store::EntityStore;
pub use types::{Column, Comparison, Condition, QueryWindow, StorePredicate};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use provider::MockContentProvider;
#[cfg(test)]
pub use store::MockEntityStore;
#[cfg(test)]
pub use testing::MockClockPort;

pub use testing::ClockPort;
