//! The physical row model.
//!
//! [`RowDef`] describes a table's row shape for one schema generation;
//! [`RowData`] is a short-lived value row (possibly partially populated,
//! when used as a scan bound); the encoding module turns both into the
//! byte keys and payloads the tree space stores.

mod encoding;
mod rowdata;
mod rowdef;

pub use encoding::{
    decode_key_field, decode_row, encode_key_field, encode_row, skip_key_field,
};
pub use rowdata::{Field, RowData};
pub use rowdef::{HKeyLevel, RowDef, RowDefs};
