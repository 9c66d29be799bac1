//! Storage layer for sharekit.
//!
//! Defines the [`Store`] trait and two implementations:
//!
//! - [`SqliteStore`]: the primary backend, rusqlite with bundled SQLite
//!   and versioned migrations.
//! - [`MemoryStore`]: an in-memory backend for tests.
//!
//! The one transactional guarantee lives here: token usage-cap
//! accounting is check-and-increment in a single serializable step.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Store, TokenInsert};
