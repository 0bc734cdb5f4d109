//! # arbor-store
//!
//! The storage-and-execution core of ArborDB.
//!
//! A group table physically co-locates the rows of a root table and all of
//! its descendant tables, interleaved in hierarchical-key order: every
//! parent row immediately precedes its children, and a table's subtree is
//! one contiguous byte range of the group tree. This crate owns:
//!
//! - the **tree space**: an ordered byte-range key-value store with
//!   exchange-style cursors and optimistic transactions;
//! - the **physical row model**: row definitions, row values, and the
//!   order-preserving encodings that make field order equal byte order;
//! - the **group-table scan engine**: [`GroupStore::open_scan`] returns a
//!   pull-based [`scan::RowCollector`] honoring the scan-flag table,
//!   projection bitmaps, and covering-index fast paths.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod row;
pub mod scan;
pub mod session;
pub mod store;
pub mod treespace;

pub use scan::{ColumnBitmap, RowCollector, ScanFlags, ScanRequest};
pub use session::Session;
pub use store::GroupStore;
