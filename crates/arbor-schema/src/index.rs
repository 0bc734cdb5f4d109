//! Index definitions.

use arbor_common::types::{ColumnRef, IndexId, TableId};
use serde::{Deserialize, Serialize};

/// An index over an ordered column sequence.
///
/// The owning table is the index's *target*: scans driven by the index
/// produce that table's rows (plus projected ancestors and descendants).
/// A group index may draw leading columns from the target's ancestors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    id: IndexId,
    table: TableId,
    name: String,
    columns: Vec<ColumnRef>,
    unique: bool,
    primary_key: bool,
}

impl IndexDef {
    pub(crate) fn new(
        id: IndexId,
        table: TableId,
        name: impl Into<String>,
        columns: Vec<ColumnRef>,
        unique: bool,
        primary_key: bool,
    ) -> Self {
        Self {
            id,
            table,
            name: name.into(),
            columns,
            unique,
            primary_key,
        }
    }

    /// Returns the stable index id.
    #[must_use]
    pub const fn id(&self) -> IndexId {
        self.id
    }

    /// Returns the owning (target) table.
    #[must_use]
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the indexed columns in order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Returns true if entries are unique over the indexed columns alone.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns true if this is the owning table's primary-key index.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }
}
