//! Grimoire Engine library.
//!
//! A local entity cache for tabletop rules content, kept in step with a
//! remote content provider.
//!
//! ## Structure
//!
//! - `use_cases/` - Filter compilation, fetch orchestration, bulk writes
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `api/` - HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
