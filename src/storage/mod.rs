//! Vector store port and its `SQLite` implementation.

pub mod schema;
mod sqlite;
mod traits;

pub use schema::{TABLE_CODE_CONTEXT, TABLE_FILE_METADATA, TABLE_KNOWLEDGE_BASE};
pub use sqlite::SqliteStore;
pub use traits::{Filter, Scored, StoreStats, VectorStore};

/// Default on-disk database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".codefactory/state.db";
