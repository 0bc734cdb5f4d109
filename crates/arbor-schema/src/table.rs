//! Table definitions.

use arbor_common::types::{IndexId, TableId};
use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::hkey::HKey;

/// A table: one node of a group's rooted forest.
///
/// Immutable once the owning [`crate::Schema`] is built. All linkage is
/// by id; navigation goes through the schema arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    id: TableId,
    name: String,
    parent: Option<TableId>,
    children: Vec<TableId>,
    ordinal: u16,
    columns: Vec<Column>,
    primary_key: Vec<u16>,
    parent_join: Vec<u16>,
    pk_index: IndexId,
    secondary_indexes: Vec<IndexId>,
    hkey: HKey,
    depth: usize,
}

#[allow(clippy::too_many_arguments)]
impl TableDef {
    pub(crate) fn new(
        id: TableId,
        name: impl Into<String>,
        parent: Option<TableId>,
        ordinal: u16,
        columns: Vec<Column>,
        primary_key: Vec<u16>,
        parent_join: Vec<u16>,
        depth: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            children: Vec::new(),
            ordinal,
            columns,
            primary_key,
            parent_join,
            pk_index: IndexId::INVALID,
            secondary_indexes: Vec::new(),
            hkey: HKey::new(Vec::new()),
            depth,
        }
    }

    pub(crate) fn add_child(&mut self, child: TableId) {
        self.children.push(child);
    }

    pub(crate) fn set_pk_index(&mut self, index: IndexId) {
        self.pk_index = index;
    }

    pub(crate) fn add_secondary_index(&mut self, index: IndexId) {
        self.secondary_indexes.push(index);
    }

    pub(crate) fn set_hkey(&mut self, hkey: HKey) {
        self.hkey = hkey;
    }

    /// Returns the stable table id.
    #[must_use]
    pub const fn id(&self) -> TableId {
        self.id
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent table id, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<TableId> {
        self.parent
    }

    /// Returns the child table ids in declaration order.
    #[must_use]
    pub fn children(&self) -> &[TableId] {
        &self.children
    }

    /// Returns this table's ordinal among its siblings.
    ///
    /// The ordinal is the table discriminator inside encoded hierarchical
    /// keys: rows of sibling tables sort by ordinal, after their shared
    /// parent row.
    #[must_use]
    pub const fn ordinal(&self) -> u16 {
        self.ordinal
    }

    /// Returns the columns in row order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the primary-key column positions.
    #[must_use]
    pub fn primary_key(&self) -> &[u16] {
        &self.primary_key
    }

    /// Returns the positions of the fields joining this table to its
    /// parent's primary key, in parent-PK order. Empty for roots.
    #[must_use]
    pub fn parent_join(&self) -> &[u16] {
        &self.parent_join
    }

    /// Returns the primary-key index id.
    #[must_use]
    pub const fn pk_index(&self) -> IndexId {
        self.pk_index
    }

    /// Returns the secondary index ids in declaration order.
    #[must_use]
    pub fn secondary_indexes(&self) -> &[IndexId] {
        &self.secondary_indexes
    }

    /// Returns the hierarchical key.
    #[must_use]
    pub const fn hkey(&self) -> &HKey {
        &self.hkey
    }

    /// Returns the depth in the hierarchy (0 for roots).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if this table is a group root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
