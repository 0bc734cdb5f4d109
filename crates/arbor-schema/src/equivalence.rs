//! Column equivalence oracle.
//!
//! Declares which columns of different tables carry the same value
//! (join/foreign-key relationships). Ownership of equivalence data lies
//! outside the core: callers build this up and the planner only queries
//! it.

use std::collections::HashMap;

use arbor_common::types::ColumnRef;

/// Reflexive, symmetric, transitive equivalence over columns.
///
/// Implemented as a union-find forest keyed by [`ColumnRef`].
///
/// # Example
///
/// ```rust
/// use arbor_common::types::{ColumnRef, TableId};
/// use arbor_schema::ColumnEquivalences;
///
/// let a = ColumnRef::new(TableId::new(1), 0);
/// let b = ColumnRef::new(TableId::new(2), 1);
/// let mut equiv = ColumnEquivalences::new();
/// equiv.add_equivalence(a, b);
/// assert!(equiv.are_equivalent(a, b));
/// assert!(equiv.are_equivalent(b, a));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ColumnEquivalences {
    parent: HashMap<ColumnRef, ColumnRef>,
}

impl ColumnEquivalences {
    /// Creates an empty oracle (only reflexive equivalences hold).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, column: ColumnRef) -> ColumnRef {
        let mut current = column;
        while let Some(&next) = self.parent.get(&current) {
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Declares two columns equivalent.
    pub fn add_equivalence(&mut self, a: ColumnRef, b: ColumnRef) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        self.parent.entry(a).or_insert(root_a);
        self.parent.entry(b).or_insert(root_b);
        if root_a != root_b {
            self.parent.insert(root_b, root_a);
        }
    }

    /// Returns true if the two columns are known to carry the same value.
    ///
    /// Always true for a column and itself.
    #[must_use]
    pub fn are_equivalent(&self, a: ColumnRef, b: ColumnRef) -> bool {
        a == b || self.find(a) == self.find(b)
    }

    /// Returns true if `columns` contains a column equivalent to `target`.
    #[must_use]
    pub fn contains_equivalent(&self, columns: &[ColumnRef], target: ColumnRef) -> bool {
        columns.iter().any(|&c| self.are_equivalent(c, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::types::TableId;

    fn col(table: u32, pos: u16) -> ColumnRef {
        ColumnRef::new(TableId::new(table), pos)
    }

    #[test]
    fn test_reflexive() {
        let equiv = ColumnEquivalences::new();
        assert!(equiv.are_equivalent(col(1, 0), col(1, 0)));
        assert!(!equiv.are_equivalent(col(1, 0), col(2, 0)));
    }

    #[test]
    fn test_transitive() {
        let mut equiv = ColumnEquivalences::new();
        equiv.add_equivalence(col(1, 0), col(2, 1));
        equiv.add_equivalence(col(2, 1), col(3, 1));
        assert!(equiv.are_equivalent(col(1, 0), col(3, 1)));
        assert!(equiv.are_equivalent(col(3, 1), col(1, 0)));
        assert!(!equiv.are_equivalent(col(1, 0), col(3, 0)));
    }

    #[test]
    fn test_contains_equivalent() {
        let mut equiv = ColumnEquivalences::new();
        equiv.add_equivalence(col(1, 0), col(2, 1));
        let columns = [col(2, 1), col(2, 0)];
        assert!(equiv.contains_equivalent(&columns, col(1, 0)));
        assert!(!equiv.contains_equivalent(&columns, col(3, 0)));
    }
}
