//! SQLite entity store.

mod predicate;
mod schema;
mod store;

pub use store::SqliteEntityStore;
