//! taggable adapters crate
//!
//! Infrastructure adapters implementing the domain ports:
//! - `store`: SQLite and in-memory tag stores
//! - `events`: Event sinks (tracing, recording, null)

pub mod events;
mod store_memory;
mod store_sqlite;

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryTagStore;
    pub use crate::store_sqlite::SqliteTagStore;
}
