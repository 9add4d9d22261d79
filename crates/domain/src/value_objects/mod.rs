//! Value objects - Immutable objects defined by their attributes

mod entity_type;
mod scalar;

pub use entity_type::EntityType;
pub use scalar::{fold_case, AttributeKind, ScalarValue};
