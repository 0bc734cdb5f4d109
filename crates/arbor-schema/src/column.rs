//! Column definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Int,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
}

impl ColumnType {
    /// Returns the type name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Text => "Text",
            Self::Bytes => "Bytes",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A column belonging to exactly one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    position: u16,
}

impl Column {
    pub(crate) fn new(name: impl Into<String>, column_type: ColumnType, position: u16) -> Self {
        Self {
            name: name.into(),
            column_type,
            position,
        }
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Returns the position within the owning table's row.
    #[must_use]
    pub const fn position(&self) -> u16 {
        self.position
    }
}
