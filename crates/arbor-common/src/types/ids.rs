//! Core identifier types for ArborDB.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Table identifier - uniquely identifies a table within a schema.
///
/// Tables are created at schema-definition time and keep their id for
/// their whole lifetime.
///
/// # Example
///
/// ```rust
/// use arbor_common::types::TableId;
///
/// let table = TableId::new(3);
/// assert_eq!(table.as_u32(), 3);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TableId(u32);

impl TableId {
    /// Invalid table ID, used as a sentinel value.
    pub const INVALID: Self = Self(u32::MAX);

    /// First valid table ID.
    pub const FIRST: Self = Self(1);

    /// Creates a new `TableId` from a raw u32 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the next table ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid table ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "TableId(INVALID)")
        } else {
            write!(f, "TableId({})", self.0)
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TableId {
    #[inline]
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl From<TableId> for u32 {
    #[inline]
    fn from(id: TableId) -> Self {
        id.0
    }
}

/// Index identifier - uniquely identifies an index within a schema.
///
/// Id 0 is reserved for [`IndexId::GROUP`], which selects physical
/// hierarchical-key order over the whole group rather than a stored index
/// tree. Real indexes are numbered from 1.
///
/// # Example
///
/// ```rust
/// use arbor_common::types::IndexId;
///
/// assert!(IndexId::GROUP.is_group_order());
/// assert!(!IndexId::new(1).is_group_order());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct IndexId(u32);

impl IndexId {
    /// Reserved id selecting physical group (hierarchical-key) order.
    pub const GROUP: Self = Self(0);

    /// Invalid index ID, used as a sentinel value.
    pub const INVALID: Self = Self(u32::MAX);

    /// First valid stored-index ID.
    pub const FIRST: Self = Self(1);

    /// Creates a new `IndexId` from a raw u32 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the next index ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid index ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Returns true if this id selects physical group order rather than a
    /// stored index tree.
    #[inline]
    #[must_use]
    pub const fn is_group_order(self) -> bool {
        self.0 == Self::GROUP.0
    }
}

impl fmt::Debug for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "IndexId(INVALID)")
        } else if *self == Self::GROUP {
            write!(f, "IndexId(GROUP)")
        } else {
            write!(f, "IndexId({})", self.0)
        }
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for IndexId {
    #[inline]
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl From<IndexId> for u32 {
    #[inline]
    fn from(id: IndexId) -> Self {
        id.0
    }
}

/// A column identity: owning table plus position within that table's row.
///
/// Used wherever a column must be named across table boundaries - index
/// definitions, hierarchical keys, and the planner's equivalence oracle.
///
/// # Example
///
/// ```rust
/// use arbor_common::types::{ColumnRef, TableId};
///
/// let col = ColumnRef::new(TableId::new(2), 0);
/// assert_eq!(col.position, 0);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Table owning the column.
    pub table: TableId,
    /// Position of the column within the table's row.
    pub position: u16,
}

impl ColumnRef {
    /// Creates a new column reference.
    #[inline]
    #[must_use]
    pub const fn new(table: TableId, position: u16) -> Self {
        Self { table, position }
    }
}

impl fmt::Debug for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnRef({}:{})", self.table, self.position)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id() {
        let table = TableId::new(42);
        assert_eq!(table.as_u32(), 42);
        assert!(table.is_valid());
        assert!(!TableId::INVALID.is_valid());
        assert_eq!(table.next().as_u32(), 43);
    }

    #[test]
    fn test_index_id_group_sentinel() {
        assert!(IndexId::GROUP.is_group_order());
        assert!(IndexId::GROUP.is_valid());
        assert!(!IndexId::new(5).is_group_order());
        assert_eq!(format!("{:?}", IndexId::GROUP), "IndexId(GROUP)");
    }

    #[test]
    fn test_column_ref_ordering() {
        let a = ColumnRef::new(TableId::new(1), 2);
        let b = ColumnRef::new(TableId::new(1), 3);
        let c = ColumnRef::new(TableId::new(2), 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_ordering() {
        assert!(TableId::new(1) < TableId::new(2));
        assert!(IndexId::GROUP < IndexId::new(1));
    }
}
