//! Hierarchical keys.
//!
//! A table's HKey is the ordered column sequence that fixes the physical
//! position of its rows within the group tree: the parent's HKey extended
//! by the table's own primary-key columns. Because a parent's HKey is a
//! strict prefix of every child's, a table's subtree occupies one
//! contiguous byte range of the group tree.

use arbor_common::types::ColumnRef;
use serde::{Deserialize, Serialize};

/// Ordered column sequence defining a row's physical position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HKey {
    columns: Vec<ColumnRef>,
}

impl HKey {
    pub(crate) fn new(columns: Vec<ColumnRef>) -> Self {
        Self { columns }
    }

    /// Returns the columns in root-to-leaf order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if `other` is a proper extension of this key, meaning
    /// `other` starts with exactly this key's columns and adds at least
    /// one more.
    #[must_use]
    pub fn is_proper_prefix_of(&self, other: &HKey) -> bool {
        other.columns.len() > self.columns.len()
            && other.columns[..self.columns.len()] == self.columns[..]
    }
}
