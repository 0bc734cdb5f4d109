//! The schema arena and its builder.

use arbor_common::error::{ArborError, ArborResult};
use arbor_common::types::{ColumnRef, IndexId, TableId};
use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnType};
use crate::hkey::HKey;
use crate::index::IndexDef;
use crate::table::TableDef;

/// An immutable schema: every table and index of one database generation,
/// indexed by stable id.
///
/// Ancestry navigation is an id-chasing walk over the arena; no table
/// holds a reference to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    tables: Vec<TableDef>,
    indexes: Vec<IndexDef>,
    roots: Vec<TableId>,
}

impl Schema {
    fn table_slot(&self, id: TableId) -> Option<&TableDef> {
        let idx = id.as_u32().checked_sub(1)? as usize;
        self.tables.get(idx)
    }

    fn index_slot(&self, id: IndexId) -> Option<&IndexDef> {
        let idx = id.as_u32().checked_sub(1)? as usize;
        self.indexes.get(idx)
    }

    /// Looks up a table by id.
    pub fn table(&self, id: TableId) -> ArborResult<&TableDef> {
        self.table_slot(id)
            .ok_or(ArborError::UnknownTable { table_id: id })
    }

    /// Looks up an index by id.
    ///
    /// [`IndexId::GROUP`] is not a stored index and is rejected here;
    /// callers that accept group order must branch before resolving.
    pub fn index(&self, id: IndexId) -> ArborResult<&IndexDef> {
        self.index_slot(id)
            .ok_or(ArborError::UnknownIndex { index_id: id })
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table_by_name(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Looks up an index by owning table and name.
    #[must_use]
    pub fn index_by_name(&self, table: TableId, name: &str) -> Option<&IndexDef> {
        self.indexes
            .iter()
            .find(|i| i.table() == table && i.name() == name)
    }

    /// Returns all tables in id order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter()
    }

    /// Returns all indexes in id order.
    pub fn indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.indexes.iter()
    }

    /// Returns the group-root table ids in declaration order.
    #[must_use]
    pub fn roots(&self) -> &[TableId] {
        &self.roots
    }

    /// Returns the declared type of a column.
    pub fn column_type(&self, column: ColumnRef) -> ArborResult<ColumnType> {
        let table = self.table(column.table)?;
        table
            .columns()
            .get(column.position as usize)
            .map(Column::column_type)
            .ok_or_else(|| {
                ArborError::invalid_argument(format!("column {column} out of range"))
            })
    }

    /// Returns the path from the group root down to `id`, inclusive.
    ///
    /// Empty if the id is unknown.
    #[must_use]
    pub fn ancestry_path(&self, id: TableId) -> Vec<TableId> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(table) = self.table_slot(current) else {
                return Vec::new();
            };
            path.push(current);
            cursor = table.parent();
        }
        path.reverse();
        path
    }

    /// Returns true if `ancestor` is a strict ancestor of `descendant`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: TableId, descendant: TableId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut cursor = self.table_slot(descendant).and_then(TableDef::parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.table_slot(current).and_then(TableDef::parent);
        }
        false
    }

    /// Returns the deepest table that is an ancestor-or-self of both
    /// arguments, or `None` if they belong to different groups.
    #[must_use]
    pub fn common_ancestor(&self, a: TableId, b: TableId) -> Option<TableId> {
        let path_a = self.ancestry_path(a);
        let path_b = self.ancestry_path(b);
        let mut common = None;
        for (ta, tb) in path_a.iter().zip(path_b.iter()) {
            if ta == tb {
                common = Some(*ta);
            } else {
                break;
            }
        }
        common
    }

    /// Returns the group root of a table.
    pub fn group_root(&self, id: TableId) -> ArborResult<TableId> {
        self.table(id)?;
        Ok(*self
            .ancestry_path(id)
            .first()
            .unwrap_or(&TableId::INVALID))
    }

    /// Returns every table of a group in hierarchical order: each parent
    /// before its children, siblings in ordinal order.
    ///
    /// This is the flattened-row-shape order used by projection bitmaps.
    pub fn group_tables(&self, root: TableId) -> ArborResult<Vec<TableId>> {
        let root_table = self.table(root)?;
        if !root_table.is_root() {
            return Err(ArborError::invalid_argument(format!(
                "table {root} is not a group root"
            )));
        }
        let mut ordered = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            ordered.push(id);
            if let Some(table) = self.table_slot(id) {
                // Reverse push so children pop in declaration order.
                for child in table.children().iter().rev() {
                    stack.push(*child);
                }
            }
        }
        Ok(ordered)
    }
}

/// Builds a [`Schema`]: the only mutation surface of the data model.
///
/// Parents must be added before children. Every table gets its
/// primary-key index automatically; secondary and group indexes are
/// declared explicitly.
///
/// # Example
///
/// ```rust
/// use arbor_schema::{ColumnType, SchemaBuilder};
///
/// let mut builder = SchemaBuilder::new();
/// let root = builder
///     .add_table("customer", None, &[("cid", ColumnType::Int)], &[0], &[])
///     .unwrap();
/// let child = builder
///     .add_table(
///         "order",
///         Some(root),
///         &[("oid", ColumnType::Int), ("cid", ColumnType::Int)],
///         &[0],
///         &[1],
///     )
///     .unwrap();
/// let schema = builder.finish().unwrap();
/// assert_eq!(schema.table(child).unwrap().hkey().num_columns(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: Vec<TableDef>,
    indexes: Vec<IndexDef>,
    roots: Vec<TableId>,
}

impl SchemaBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, id: TableId) -> ArborResult<&mut TableDef> {
        let idx = id.as_u32().checked_sub(1).map(|i| i as usize);
        idx.and_then(|i| self.tables.get_mut(i))
            .ok_or(ArborError::UnknownTable { table_id: id })
    }

    fn table_ref(&self, id: TableId) -> ArborResult<&TableDef> {
        let idx = id.as_u32().checked_sub(1).map(|i| i as usize);
        idx.and_then(|i| self.tables.get(i))
            .ok_or(ArborError::UnknownTable { table_id: id })
    }

    /// Adds a table.
    ///
    /// `primary_key` lists PK column positions; `parent_join` lists the
    /// positions of this table's fields that carry the parent's PK values,
    /// in parent-PK order (empty for roots).
    pub fn add_table(
        &mut self,
        name: &str,
        parent: Option<TableId>,
        columns: &[(&str, ColumnType)],
        primary_key: &[u16],
        parent_join: &[u16],
    ) -> ArborResult<TableId> {
        if columns.is_empty() {
            return Err(ArborError::InvalidDefinition {
                message: format!("table '{name}' has no columns"),
            });
        }
        if primary_key.is_empty() {
            return Err(ArborError::InvalidDefinition {
                message: format!("table '{name}' has no primary key"),
            });
        }
        for &pos in primary_key.iter().chain(parent_join.iter()) {
            if pos as usize >= columns.len() {
                return Err(ArborError::InvalidDefinition {
                    message: format!("table '{name}': column position {pos} out of range"),
                });
            }
        }

        let id = TableId::new(self.tables.len() as u32 + 1);
        let (ordinal, depth, parent_hkey) = match parent {
            None => {
                if !parent_join.is_empty() {
                    return Err(ArborError::InvalidDefinition {
                        message: format!("root table '{name}' declares a parent join"),
                    });
                }
                self.roots.push(id);
                (self.roots.len() as u16, 0, Vec::new())
            }
            Some(parent_id) => {
                let parent_table = self.table_ref(parent_id)?;
                if parent_join.len() != parent_table.primary_key().len() {
                    return Err(ArborError::InvalidDefinition {
                        message: format!(
                            "table '{name}': parent join arity {} does not match parent PK arity {}",
                            parent_join.len(),
                            parent_table.primary_key().len()
                        ),
                    });
                }
                for (&join_pos, &pk_pos) in parent_join.iter().zip(parent_table.primary_key()) {
                    let join_type = columns[join_pos as usize].1;
                    let pk_type = parent_table.columns()[pk_pos as usize].column_type();
                    if join_type != pk_type {
                        return Err(ArborError::InvalidDefinition {
                            message: format!(
                                "table '{name}': parent join column type {join_type} does not match parent PK type {pk_type}"
                            ),
                        });
                    }
                }
                let ordinal = parent_table.children().len() as u16 + 1;
                let depth = parent_table.depth() + 1;
                let hkey = parent_table.hkey().columns().to_vec();
                (ordinal, depth, hkey)
            }
        };

        let column_defs = columns
            .iter()
            .enumerate()
            .map(|(pos, (col_name, col_type))| Column::new(*col_name, *col_type, pos as u16))
            .collect();

        let mut table = TableDef::new(
            id,
            name,
            parent,
            ordinal,
            column_defs,
            primary_key.to_vec(),
            parent_join.to_vec(),
            depth,
        );

        let mut hkey_columns = parent_hkey;
        hkey_columns.extend(primary_key.iter().map(|&pos| ColumnRef::new(id, pos)));
        table.set_hkey(HKey::new(hkey_columns));

        // The PK index is created with the table.
        let pk_columns: Vec<ColumnRef> = primary_key
            .iter()
            .map(|&pos| ColumnRef::new(id, pos))
            .collect();
        let pk_index_id = IndexId::new(self.indexes.len() as u32 + 1);
        self.indexes.push(IndexDef::new(
            pk_index_id,
            id,
            format!("{name}_pk"),
            pk_columns,
            true,
            true,
        ));
        table.set_pk_index(pk_index_id);

        self.tables.push(table);
        if let Some(parent_id) = parent {
            self.table_mut(parent_id)?.add_child(id);
        }
        Ok(id)
    }

    /// Adds a secondary index over columns of the owning table.
    pub fn add_index(
        &mut self,
        table: TableId,
        name: &str,
        positions: &[u16],
        unique: bool,
    ) -> ArborResult<IndexId> {
        let columns = positions
            .iter()
            .map(|&pos| ColumnRef::new(table, pos))
            .collect();
        self.add_group_index(table, name, columns, unique)
    }

    /// Adds an index whose columns may span the owning table's ancestor
    /// chain (a group index).
    pub fn add_group_index(
        &mut self,
        table: TableId,
        name: &str,
        columns: Vec<ColumnRef>,
        unique: bool,
    ) -> ArborResult<IndexId> {
        if columns.is_empty() {
            return Err(ArborError::InvalidDefinition {
                message: format!("index '{name}' has no columns"),
            });
        }
        let owner = self.table_ref(table)?;
        let owner_id = owner.id();
        for column in &columns {
            let col_table = self.table_ref(column.table)?;
            if column.position as usize >= col_table.num_columns() {
                return Err(ArborError::InvalidDefinition {
                    message: format!("index '{name}': column {column} out of range"),
                });
            }
            let on_chain = column.table == owner_id || {
                // Strict ancestor walk over what has been built so far.
                let mut cursor = self.table_ref(owner_id)?.parent();
                let mut found = false;
                while let Some(current) = cursor {
                    if current == column.table {
                        found = true;
                        break;
                    }
                    cursor = self.table_ref(current)?.parent();
                }
                found
            };
            if !on_chain {
                return Err(ArborError::InvalidDefinition {
                    message: format!(
                        "index '{name}': column {column} is not on table {owner_id}'s ancestor chain"
                    ),
                });
            }
        }

        let id = IndexId::new(self.indexes.len() as u32 + 1);
        self.indexes
            .push(IndexDef::new(id, table, name, columns, unique, false));
        self.table_mut(table)?.add_secondary_index(id);
        Ok(id)
    }

    /// Finishes the build, checking cross-table invariants.
    pub fn finish(self) -> ArborResult<Schema> {
        // Every non-root hkey must properly extend its parent's.
        for table in &self.tables {
            if let Some(parent_id) = table.parent() {
                let idx = parent_id.as_u32() as usize - 1;
                let parent = self.tables.get(idx).ok_or(ArborError::UnknownTable {
                    table_id: parent_id,
                })?;
                if !parent.hkey().is_proper_prefix_of(table.hkey()) {
                    return Err(ArborError::InvalidDefinition {
                        message: format!(
                            "table '{}': hkey does not extend parent '{}'",
                            table.name(),
                            parent.name()
                        ),
                    });
                }
            }
        }
        Ok(Schema {
            tables: self.tables,
            indexes: self.indexes,
            roots: self.roots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_level() -> (Schema, TableId, TableId, TableId) {
        let mut builder = SchemaBuilder::new();
        let root = builder
            .add_table("root", None, &[("rid", ColumnType::Int)], &[0], &[])
            .unwrap();
        let mid = builder
            .add_table(
                "mid",
                Some(root),
                &[("mid_id", ColumnType::Int), ("rid", ColumnType::Int)],
                &[0],
                &[1],
            )
            .unwrap();
        let leaf = builder
            .add_table(
                "leaf",
                Some(mid),
                &[("leaf_id", ColumnType::Int), ("mid_id", ColumnType::Int)],
                &[0],
                &[1],
            )
            .unwrap();
        (builder.finish().unwrap(), root, mid, leaf)
    }

    #[test]
    fn test_hkey_extension() {
        let (schema, root, mid, leaf) = three_level();
        assert_eq!(schema.table(root).unwrap().hkey().num_columns(), 1);
        assert_eq!(schema.table(mid).unwrap().hkey().num_columns(), 2);
        assert_eq!(schema.table(leaf).unwrap().hkey().num_columns(), 3);
        assert!(schema
            .table(mid)
            .unwrap()
            .hkey()
            .is_proper_prefix_of(schema.table(leaf).unwrap().hkey()));
    }

    #[test]
    fn test_ancestry_navigation() {
        let (schema, root, mid, leaf) = three_level();
        assert!(schema.is_ancestor(root, leaf));
        assert!(schema.is_ancestor(mid, leaf));
        assert!(!schema.is_ancestor(leaf, root));
        assert!(!schema.is_ancestor(root, root));
        assert_eq!(schema.ancestry_path(leaf), vec![root, mid, leaf]);
        assert_eq!(schema.group_root(leaf).unwrap(), root);
    }

    #[test]
    fn test_common_ancestor() {
        let mut builder = SchemaBuilder::new();
        let root = builder
            .add_table("root", None, &[("rid", ColumnType::Int)], &[0], &[])
            .unwrap();
        let left = builder
            .add_table(
                "left",
                Some(root),
                &[("lid", ColumnType::Int), ("rid", ColumnType::Int)],
                &[0],
                &[1],
            )
            .unwrap();
        let right = builder
            .add_table(
                "right",
                Some(root),
                &[("xid", ColumnType::Int), ("rid", ColumnType::Int)],
                &[0],
                &[1],
            )
            .unwrap();
        let schema = builder.finish().unwrap();

        assert_eq!(schema.common_ancestor(left, right), Some(root));
        assert_eq!(schema.common_ancestor(left, left), Some(left));
        assert_eq!(schema.common_ancestor(root, left), Some(root));
    }

    #[test]
    fn test_group_tables_order() {
        let (schema, root, mid, leaf) = three_level();
        assert_eq!(schema.group_tables(root).unwrap(), vec![root, mid, leaf]);
        assert!(schema.group_tables(mid).is_err());
    }

    #[test]
    fn test_pk_index_autocreated() {
        let (schema, root, _, _) = three_level();
        let pk = schema.table(root).unwrap().pk_index();
        let index = schema.index(pk).unwrap();
        assert!(index.is_primary_key());
        assert!(index.is_unique());
        assert_eq!(index.columns(), &[ColumnRef::new(root, 0)]);
    }

    #[test]
    fn test_rejects_bad_parent_join() {
        let mut builder = SchemaBuilder::new();
        let root = builder
            .add_table("root", None, &[("rid", ColumnType::Int)], &[0], &[])
            .unwrap();
        let result = builder.add_table(
            "child",
            Some(root),
            &[("cid", ColumnType::Int), ("rid", ColumnType::Text)],
            &[0],
            &[1],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_off_chain_group_index() {
        let mut builder = SchemaBuilder::new();
        let root = builder
            .add_table("root", None, &[("rid", ColumnType::Int)], &[0], &[])
            .unwrap();
        let left = builder
            .add_table(
                "left",
                Some(root),
                &[("lid", ColumnType::Int), ("rid", ColumnType::Int)],
                &[0],
                &[1],
            )
            .unwrap();
        let right = builder
            .add_table(
                "right",
                Some(root),
                &[("xid", ColumnType::Int), ("rid", ColumnType::Int)],
                &[0],
                &[1],
            )
            .unwrap();
        // `left` is not on `right`'s ancestor chain.
        let result = builder.add_group_index(
            right,
            "bad",
            vec![ColumnRef::new(left, 0), ColumnRef::new(right, 0)],
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_lookups() {
        let (schema, _, _, _) = three_level();
        assert!(schema.table(TableId::new(99)).is_err());
        assert!(schema.index(IndexId::new(99)).is_err());
        assert!(schema.index(IndexId::GROUP).is_err());
    }
}
