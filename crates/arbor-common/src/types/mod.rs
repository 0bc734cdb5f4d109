//! Core types for ArborDB.

mod ids;
mod keys;

pub use ids::{ColumnRef, IndexId, TableId};
pub use keys::{StorageKey, StorageValue};
