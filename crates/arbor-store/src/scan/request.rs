//! Scan requests.

use arbor_common::types::{IndexId, TableId};

use crate::row::RowData;

use super::flags::ScanFlags;
use super::projection::ColumnBitmap;

/// A value object fully describing one scan-engine invocation.
///
/// `start`/`end` are partially populated rows whose leading non-null
/// fields bound the chosen index's leading columns, in index-column
/// order; `None` (or a row with no populated fields) means edge
/// semantics on that side.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Any table of the target group; resolved to its group root.
    pub group: TableId,
    /// Ordering index: [`IndexId::GROUP`] (or the root's PK index) scans
    /// the group tree in hierarchical-key order, any other id scans that
    /// index's tree.
    pub index: IndexId,
    /// Scan flags.
    pub flags: ScanFlags,
    /// Logical start bound.
    pub start: Option<RowData>,
    /// Logical end bound.
    pub end: Option<RowData>,
    /// One bit per column of the group's flattened row shape.
    pub projection: ColumnBitmap,
}

impl ScanRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(
        group: TableId,
        index: IndexId,
        flags: ScanFlags,
        start: Option<RowData>,
        end: Option<RowData>,
        projection: ColumnBitmap,
    ) -> Self {
        Self {
            group,
            index,
            flags,
            start,
            end,
            projection,
        }
    }

    /// Creates a whole-group, edge-to-edge request.
    #[must_use]
    pub fn full_group(group: TableId, projection: ColumnBitmap) -> Self {
        Self::new(
            group,
            IndexId::GROUP,
            ScanFlags::START_AT_EDGE | ScanFlags::END_AT_EDGE,
            None,
            None,
            projection,
        )
    }
}
