//! Row definitions.
//!
//! A [`RowDef`] is the shape descriptor the write path and the scan engine
//! share for one table: field count and types, primary-key and parent-join
//! positions, and the table's place in its group. [`RowDefs`] caches one
//! per table for a schema generation and owns the hierarchical-key byte
//! layout: per level root-to-table, a two-byte sibling ordinal followed by
//! that level's key-encoded primary-key fields. A parent's encoded key is
//! a strict byte prefix of each child's, which is what keeps a subtree in
//! one contiguous range of the group tree.

use std::collections::HashMap;

use arbor_common::error::{ArborError, ArborResult};
use arbor_common::types::{IndexId, TableId};
use arbor_schema::{ColumnType, Schema};

use super::encoding::{decode_key_field, encode_key_field};
use super::rowdata::{Field, RowData};

/// Shape descriptor for one table's rows, immutable per schema generation.
#[derive(Debug, Clone)]
pub struct RowDef {
    table: TableId,
    ordinal: u16,
    parent: Option<TableId>,
    group_root: TableId,
    depth: usize,
    field_types: Vec<ColumnType>,
    primary_key: Vec<u16>,
    parent_join: Vec<u16>,
    pk_index: IndexId,
    secondary_indexes: Vec<IndexId>,
    flat_offset: usize,
}

impl RowDef {
    /// Returns the table id.
    #[must_use]
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// Returns the sibling ordinal used in encoded hierarchical keys.
    #[must_use]
    pub const fn ordinal(&self) -> u16 {
        self.ordinal
    }

    /// Returns the parent table id, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<TableId> {
        self.parent
    }

    /// Returns the group root table id.
    #[must_use]
    pub const fn group_root(&self) -> TableId {
        self.group_root
    }

    /// Returns the depth in the hierarchy (0 for roots).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the number of fields in a row of this table.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.field_types.len()
    }

    /// Returns the declared type of each field.
    #[must_use]
    pub fn field_types(&self) -> &[ColumnType] {
        &self.field_types
    }

    /// Returns the primary-key field positions.
    #[must_use]
    pub fn primary_key(&self) -> &[u16] {
        &self.primary_key
    }

    /// Returns the positions of the fields carrying the parent's
    /// primary-key values, in parent-PK order. Empty for roots.
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

    /// Returns this table's first bit in the group's flattened
    /// projection bitmap.
    #[must_use]
    pub const fn flat_offset(&self) -> usize {
        self.flat_offset
    }

    /// Checks a full row against this shape.
    ///
    /// Field count must match, every populated field must carry the
    /// declared type, primary-key fields must be populated, and for
    /// non-root tables the parent-join fields must be populated.
    pub fn check_shape(&self, row: &RowData) -> ArborResult<()> {
        if row.num_fields() != self.field_count() {
            return Err(ArborError::RowShapeMismatch {
                expected: self.field_count(),
                actual: row.num_fields(),
            });
        }
        for (pos, field) in row.fields().iter().enumerate() {
            if let Some(field) = field {
                let declared = self.field_types[pos];
                if field.column_type() != declared {
                    return Err(ArborError::FieldTypeMismatch {
                        expected: declared.name(),
                        actual: field.column_type().name(),
                    });
                }
            }
        }
        for &pos in &self.primary_key {
            if row.field(pos).is_none() {
                return Err(ArborError::invalid_argument(format!(
                    "table {}: primary-key field {pos} is NULL",
                    self.table
                )));
            }
        }
        if self.parent.is_some() {
            for &pos in &self.parent_join {
                if row.field(pos).is_none() {
                    return Err(ArborError::invalid_argument(format!(
                        "table {}: parent-join field {pos} is NULL",
                        self.table
                    )));
                }
            }
        }
        Ok(())
    }

    /// Appends this table's own hierarchical-key level for `row`: the
    /// sibling ordinal, then the key-encoded primary-key fields.
    ///
    /// Callers must have validated the row with [`RowDef::check_shape`].
    pub fn append_own_level(&self, row: &RowData, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.ordinal.to_be_bytes());
        for &pos in &self.primary_key {
            encode_key_field(row.field(pos), false, out);
        }
    }
}

/// One parsed level of an encoded hierarchical key.
#[derive(Debug, Clone)]
pub struct HKeyLevel {
    /// Table owning this level.
    pub table: TableId,
    /// Byte offset just past this level; `bytes[..end]` is the hkey of
    /// this level's row.
    pub end: usize,
    /// This level's primary-key field values.
    pub pk_fields: Vec<Field>,
}

/// The per-schema-generation cache of row definitions.
#[derive(Debug)]
pub struct RowDefs {
    defs: HashMap<TableId, RowDef>,
    child_by_ordinal: HashMap<(Option<TableId>, u16), TableId>,
    group_order: HashMap<TableId, Vec<TableId>>,
    flat_width: HashMap<TableId, usize>,
}

impl RowDefs {
    /// Builds a row definition for every table of the schema.
    pub fn build(schema: &Schema) -> ArborResult<Self> {
        let mut defs = HashMap::new();
        let mut child_by_ordinal = HashMap::new();
        let mut group_order = HashMap::new();
        let mut flat_width = HashMap::new();

        for &root in schema.roots() {
            let order = schema.group_tables(root)?;
            let mut offset = 0;
            for &id in &order {
                let table = schema.table(id)?;
                child_by_ordinal.insert((table.parent(), table.ordinal()), id);
                defs.insert(
                    id,
                    RowDef {
                        table: id,
                        ordinal: table.ordinal(),
                        parent: table.parent(),
                        group_root: root,
                        depth: table.depth(),
                        field_types: table
                            .columns()
                            .iter()
                            .map(|c| c.column_type())
                            .collect(),
                        primary_key: table.primary_key().to_vec(),
                        parent_join: table.parent_join().to_vec(),
                        pk_index: table.pk_index(),
                        secondary_indexes: table.secondary_indexes().to_vec(),
                        flat_offset: offset,
                    },
                );
                offset += table.num_columns();
            }
            flat_width.insert(root, offset);
            group_order.insert(root, order);
        }

        Ok(Self {
            defs,
            child_by_ordinal,
            group_order,
            flat_width,
        })
    }

    /// Returns the row definition for a table.
    pub fn rowdef(&self, id: TableId) -> ArborResult<&RowDef> {
        self.defs
            .get(&id)
            .ok_or(ArborError::UnknownTable { table_id: id })
    }

    /// Returns a group's tables in hierarchical order (each parent before
    /// its children, siblings in ordinal order).
    pub fn group_order(&self, root: TableId) -> ArborResult<&[TableId]> {
        self.group_order
            .get(&root)
            .map(Vec::as_slice)
            .ok_or(ArborError::UnknownTable { table_id: root })
    }

    /// Returns the total column count of a group's flattened row shape.
    pub fn flat_width(&self, root: TableId) -> ArborResult<usize> {
        self.flat_width
            .get(&root)
            .copied()
            .ok_or(ArborError::UnknownTable { table_id: root })
    }

    /// Returns true if `ancestor` is a strict ancestor of `descendant`.
    #[must_use]
    pub fn is_strict_ancestor(&self, ancestor: TableId, descendant: TableId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut cursor = self.defs.get(&descendant).and_then(|d| d.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.defs.get(&current).and_then(|d| d.parent);
        }
        false
    }

    /// Parses an encoded hierarchical key into its levels.
    ///
    /// The walk is structural: at each level the two-byte ordinal selects
    /// the table among the previous level's children, which fixes how many
    /// primary-key fields follow.
    pub fn parse_hkey(&self, bytes: &[u8]) -> ArborResult<Vec<HKeyLevel>> {
        let mut levels = Vec::new();
        let mut parent = None;
        let mut pos = 0;
        while pos < bytes.len() {
            let Some(raw) = bytes.get(pos..pos + 2) else {
                return Err(ArborError::corrupt("truncated hkey ordinal"));
            };
            let ordinal = u16::from_be_bytes([raw[0], raw[1]]);
            pos += 2;
            let table = *self
                .child_by_ordinal
                .get(&(parent, ordinal))
                .ok_or_else(|| {
                    ArborError::corrupt(format!("hkey ordinal {ordinal} matches no table"))
                })?;
            let arity = self.defs[&table].primary_key.len();
            let mut pk_fields = Vec::with_capacity(arity);
            for _ in 0..arity {
                let field = decode_key_field(bytes, &mut pos)?
                    .ok_or_else(|| ArborError::corrupt("NULL hkey field"))?;
                pk_fields.push(field);
            }
            levels.push(HKeyLevel {
                table,
                end: pos,
                pk_fields,
            });
            parent = Some(table);
        }
        if levels.is_empty() {
            return Err(ArborError::corrupt("empty hkey"));
        }
        Ok(levels)
    }
}
