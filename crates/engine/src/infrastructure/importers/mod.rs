//! Offline content importers.

mod json_dump;

pub use json_dump::{ImportReport, ImportTypeReport, JsonDumpImporter, TypeDump};
