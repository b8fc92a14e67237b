//! SQLite-backed storage implementation.

mod agents;
mod config;
pub mod schema;
mod sources;
mod store;
mod templates;
mod transaction;
mod variables;

pub use store::SqliteStore;
