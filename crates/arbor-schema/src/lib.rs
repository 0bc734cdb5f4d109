//! # arbor-schema
//!
//! The data-model arena for ArborDB: tables arranged in rooted forests
//! ("groups"), their columns, indexes, and hierarchical keys.
//!
//! Tables reference each other by stable id rather than by pointer; all
//! ancestry questions (parent, depth, common ancestor) are id-chasing
//! walks over the [`Schema`] arena. A schema is immutable once built.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod column;
mod equivalence;
mod hkey;
mod index;
mod schema;
mod table;

pub use column::{Column, ColumnType};
pub use equivalence::ColumnEquivalences;
pub use hkey::HKey;
pub use index::IndexDef;
pub use schema::{Schema, SchemaBuilder};
pub use table::TableDef;
