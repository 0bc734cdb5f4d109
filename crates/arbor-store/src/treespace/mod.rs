//! Ordered byte-range storage.
//!
//! The tree space is the storage boundary of the core: a namespaced
//! collection of ordered byte-keyed trees with cursor traversal and
//! optimistic transactions. This build keeps trees in memory; the scan
//! engine depends only on comparator-consistent keys and the cursor
//! primitives, so a disk-backed tree can replace [`Tree`] without touching
//! the layers above.

mod cursor;
mod tree;
mod txn;

pub use cursor::{Cursor, Direction};
pub use tree::{Tree, TreeSpace};
pub use txn::Txn;
