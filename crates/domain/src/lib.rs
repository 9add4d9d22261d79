//! Grimoire domain: entity records, schemas and filters.
//!
//! Pure types and invariants shared by the store, the fetch orchestration and
//! the API layer. Nothing in this crate performs I/O.

pub mod entities;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod normalize;
pub mod schema;
pub mod value_objects;

pub use entities::{EntityRecord, RecordInvalid, RecordOrigin, RejectedRecord};
pub use error::DomainError;
pub use fetch::{CacheStats, FetchResult, Provenance};
pub use filter::{FilterClause, FilterOp, FilterSpec, FilterValue, WILDCARD};
pub use normalize::{extract_path, normalize_item};
pub use schema::{AttributeDef, EntitySchema, FieldRef, SchemaRegistry, KEY_FIELD, NAME_FIELD};
pub use value_objects::{fold_case, AttributeKind, EntityType, ScalarValue};
