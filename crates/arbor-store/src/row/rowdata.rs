//! Row values.

use arbor_schema::ColumnType;
use std::fmt;

/// One field value of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// 64-bit signed integer.
    Int(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Field {
    /// Returns the column type this field satisfies.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::Int(_) => ColumnType::Int,
            Self::Text(_) => ColumnType::Text,
            Self::Bytes(_) => ColumnType::Bytes,
        }
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Field {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "{} bytes", v.len()),
        }
    }
}

use arbor_common::types::TableId;

/// A mutable value row built per row instance.
///
/// Fields are optional: a `None` field is NULL in a stored row and
/// "unbounded" in a scan-bound row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowData {
    table: TableId,
    fields: Vec<Option<Field>>,
}

impl RowData {
    /// Creates an all-NULL row for a table with `field_count` fields.
    #[must_use]
    pub fn new(table: TableId, field_count: usize) -> Self {
        Self {
            table,
            fields: vec![None; field_count],
        }
    }

    /// Creates a row from explicit field values.
    #[must_use]
    pub fn from_fields(table: TableId, fields: Vec<Option<Field>>) -> Self {
        Self { table, fields }
    }

    /// Returns the owning table id.
    #[must_use]
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Returns a field by position.
    #[must_use]
    pub fn field(&self, position: u16) -> Option<&Field> {
        self.fields.get(position as usize).and_then(Option::as_ref)
    }

    /// Returns all fields.
    #[must_use]
    pub fn fields(&self) -> &[Option<Field>] {
        &self.fields
    }

    /// Sets a field value. Out-of-range positions are ignored.
    pub fn set_field(&mut self, position: u16, field: impl Into<Field>) {
        if let Some(slot) = self.fields.get_mut(position as usize) {
            *slot = Some(field.into());
        }
    }

    /// Clears a field back to NULL.
    pub fn clear_field(&mut self, position: u16) {
        if let Some(slot) = self.fields.get_mut(position as usize) {
            *slot = None;
        }
    }

    /// Returns true if no field is populated.
    #[must_use]
    pub fn is_all_null(&self) -> bool {
        self.fields.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut row = RowData::new(TableId::new(1), 3);
        assert!(row.is_all_null());
        row.set_field(0, 42i64);
        row.set_field(2, "x");
        assert_eq!(row.field(0), Some(&Field::Int(42)));
        assert_eq!(row.field(1), None);
        assert_eq!(row.field(2), Some(&Field::Text("x".to_string())));
        row.clear_field(0);
        assert_eq!(row.field(0), None);
    }

    #[test]
    fn test_out_of_range_set_is_ignored() {
        let mut row = RowData::new(TableId::new(1), 1);
        row.set_field(5, 1i64);
        assert_eq!(row.num_fields(), 1);
        assert!(row.field(5).is_none());
    }
}
