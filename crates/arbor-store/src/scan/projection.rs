//! Column projection bitmaps.

use arbor_common::error::ArborResult;
use arbor_common::types::TableId;

use crate::row::RowDefs;

/// One bit per column of a group's flattened row shape: the root's
/// columns first, then each table in hierarchical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBitmap {
    words: Vec<u64>,
    len: usize,
}

impl ColumnBitmap {
    /// Creates an all-clear bitmap of `len` bits.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Creates a bitmap covering every column of `root`'s group.
    pub fn all(rowdefs: &RowDefs, root: TableId) -> ArborResult<Self> {
        let mut bitmap = Self::with_len(rowdefs.flat_width(root)?);
        for bit in 0..bitmap.len {
            bitmap.set(bit);
        }
        Ok(bitmap)
    }

    /// Creates a bitmap covering every column of the given tables.
    pub fn for_tables(
        rowdefs: &RowDefs,
        root: TableId,
        tables: &[TableId],
    ) -> ArborResult<Self> {
        let mut bitmap = Self::with_len(rowdefs.flat_width(root)?);
        for &table in tables {
            let def = rowdefs.rowdef(table)?;
            for pos in 0..def.field_count() {
                bitmap.set(def.flat_offset() + pos);
            }
        }
        Ok(bitmap)
    }

    /// Creates a bitmap covering every column of every table on the path
    /// from `target`'s group root down to `target`, inclusive.
    pub fn to_root(rowdefs: &RowDefs, target: TableId) -> ArborResult<Self> {
        let mut path = vec![target];
        let mut cursor = rowdefs.rowdef(target)?.parent();
        while let Some(current) = cursor {
            path.push(current);
            cursor = rowdefs.rowdef(current)?.parent();
        }
        let root = *path.last().expect("path includes target");
        Self::for_tables(rowdefs, root, &path)
    }

    /// Returns the number of bits.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets one bit. Out-of-range bits are ignored.
    pub fn set(&mut self, bit: usize) {
        if bit < self.len {
            self.words[bit / 64] |= 1 << (bit % 64);
        }
    }

    /// Returns one bit. Out-of-range bits read as clear.
    #[must_use]
    pub fn get(&self, bit: usize) -> bool {
        bit < self.len && self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    /// Returns true if any bit in `[start, start + count)` is set.
    #[must_use]
    pub fn any_in_range(&self, start: usize, count: usize) -> bool {
        (start..start + count).any(|bit| self.get(bit))
    }

    /// Returns true if any of `table`'s columns is projected.
    pub fn table_projected(&self, rowdefs: &RowDefs, table: TableId) -> ArborResult<bool> {
        let def = rowdefs.rowdef(table)?;
        Ok(self.any_in_range(def.flat_offset(), def.field_count()))
    }

    /// Returns the set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&bit| self.get(bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_schema::{ColumnType, Schema, SchemaBuilder};

    fn two_level() -> (Schema, TableId, TableId) {
        let mut builder = SchemaBuilder::new();
        let root = builder
            .add_table(
                "root",
                None,
                &[("rid", ColumnType::Int), ("name", ColumnType::Text)],
                &[0],
                &[],
            )
            .unwrap();
        let child = builder
            .add_table(
                "child",
                Some(root),
                &[("cid", ColumnType::Int), ("rid", ColumnType::Int)],
                &[0],
                &[1],
            )
            .unwrap();
        (builder.finish().unwrap(), root, child)
    }

    #[test]
    fn test_set_get() {
        let mut bitmap = ColumnBitmap::with_len(5);
        assert!(bitmap.is_empty());
        bitmap.set(0);
        bitmap.set(4);
        bitmap.set(99); // ignored
        assert!(bitmap.get(0));
        assert!(!bitmap.get(1));
        assert!(bitmap.get(4));
        assert!(!bitmap.get(99));
        assert_eq!(bitmap.iter_set().collect::<Vec<_>>(), vec![0, 4]);
    }

    #[test]
    fn test_table_projection() {
        let (schema, root, child) = two_level();
        let rowdefs = RowDefs::build(&schema).unwrap();

        let all = ColumnBitmap::all(&rowdefs, root).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.table_projected(&rowdefs, root).unwrap());
        assert!(all.table_projected(&rowdefs, child).unwrap());

        let child_only = ColumnBitmap::for_tables(&rowdefs, root, &[child]).unwrap();
        assert!(!child_only.table_projected(&rowdefs, root).unwrap());
        assert!(child_only.table_projected(&rowdefs, child).unwrap());

        let path = ColumnBitmap::to_root(&rowdefs, child).unwrap();
        assert_eq!(path, all);
    }
}
