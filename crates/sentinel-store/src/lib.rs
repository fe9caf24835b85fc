//! # sentinel-store
//!
//! Session records and their samples, behind the [`SessionStore`] trait with
//! in-memory and SQLite backends.

/// SQLite connection wrapper.
pub mod database;
/// Error type.
pub mod error;
/// In-memory backend.
pub mod memory;
/// SQLite schema.
pub mod schema;
/// The store trait and its record types.
pub mod sessions;
/// SQLite backend.
pub mod sqlite;

pub use database::Database;
pub use error::StoreError;
pub use memory::MemorySessionStore;
pub use sessions::{NewSession, SessionRecord, SessionStore};
pub use sqlite::SqliteSessionStore;
