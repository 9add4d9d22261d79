//! Domain entities

mod record;

pub use record::{EntityRecord, RecordInvalid, RecordOrigin, RejectedRecord};
