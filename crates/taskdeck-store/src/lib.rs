//! # taskdeck-store
//!
//! Persistence for Taskdeck. The [`Store`] enum exposes one synchronous API
//! over two backends:
//!
//! - [`MemoryStore`]: typed maps behind a lock, for development and tests
//! - [`SqliteStore`]: a `rusqlite::Connection` with forward-only migrations
//!
//! Both report failures through the same [`StoreError`] taxonomy; raw SQLite
//! errors are translated by [`translate`] before they leave the crate.

pub mod memory;
pub mod migrations;
pub mod record;
pub mod sqlite;

mod error;
mod store;

pub use error::{translate, Result, StoreError};
pub use memory::MemoryStore;
pub use record::Record;
pub use sqlite::SqliteStore;
pub use store::Store;
