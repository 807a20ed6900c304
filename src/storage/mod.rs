//! Persistence for incoming transaction state
//!
//! The [`IncrementalStateStore`] owns the in-memory state and is its single
//! writer. It delegates durability to an [`IncomingTxStorage`] backend:
//! [`MemoryStorage`] is always available, and the `storage` feature adds a
//! SQLite backend.

pub mod memory;
#[cfg(feature = "storage")]
pub mod sqlite;
pub mod state_store;
pub mod storage_trait;

pub use memory::*;
#[cfg(feature = "storage")]
pub use sqlite::*;
pub use state_store::*;
pub use storage_trait::*;
