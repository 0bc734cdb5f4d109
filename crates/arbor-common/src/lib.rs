//! # arbor-common
//!
//! Common types, errors, and configuration for ArborDB.
//!
//! This crate provides the foundational types used across all ArborDB
//! components:
//!
//! - **Types**: Core identifiers (`TableId`, `IndexId`, `ColumnRef`) and
//!   byte-comparable storage keys and values
//! - **Errors**: Unified error handling with `ArborError`
//! - **Config**: Store configuration structures
//! - **Constants**: System-wide constants and limits
//!
//! ## Example
//!
//! ```rust
//! use arbor_common::types::{TableId, IndexId, StorageKey};
//! use arbor_common::error::ArborResult;
//!
//! fn example() -> ArborResult<()> {
//!     let table = TableId::new(1);
//!     let index = IndexId::new(3);
//!     let key = StorageKey::from_bytes(b"\x00\x01");
//!     assert!(table.is_valid() && index.is_valid() && !key.is_empty());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::StoreConfig;
pub use constants::*;
pub use error::{ArborError, ArborResult, ErrorCode};
pub use types::{ColumnRef, IndexId, StorageKey, StorageValue, TableId};
