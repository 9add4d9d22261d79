//! Use cases - User story orchestration.
//!
//! Use cases orchestrate across the store, the provider and the importers to
//! fulfill caller requests.

pub mod content;

pub use content::ContentCache;
