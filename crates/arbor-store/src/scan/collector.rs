//! Row collectors.
//!
//! A [`RowCollector`] executes one [`ScanRequest`]: it positions a cursor
//! over the scan tree (the group tree in hierarchical-key order, or an
//! index tree), walks the admissible byte range in the requested
//! direction, and turns each matched entry into the projected rows it
//! contributes.
//!
//! Range bounds are byte prefixes of the scan tree's keys, so every flag
//! combination reduces to interval arithmetic over prefixes: an inclusive
//! bound admits the whole prefix family, an exclusive bound excludes it,
//! and `prefix_successor` converts between the two.
//!
//! `has_more` is truthful via one-row lookahead: once it reports false, no
//! later call produces a row. A mid-stream storage failure marks the
//! collector done and releases its cursor before the error surfaces.

use std::collections::VecDeque;
use std::sync::Arc;

use arbor_common::constants::ROW_BUFFER_INITIAL_CAPACITY;
use arbor_common::error::{ArborError, ArborResult};
use arbor_common::types::{ColumnRef, StorageKey, StorageValue, TableId};
use arbor_schema::{IndexDef, Schema};
use bytes::BytesMut;
use tracing::{debug, trace};

use crate::row::{
    decode_key_field, decode_row, encode_key_field, encode_row, Field, HKeyLevel, RowData, RowDefs,
};
use crate::session::Session;
use crate::store::GroupStore;
use crate::treespace::{Cursor, Direction, Tree};

use super::flags::ScanFlags;
use super::projection::ColumnBitmap;
use super::request::ScanRequest;

/// Pull-based cursor over the rows matched by one scan request.
#[derive(Debug)]
pub struct RowCollector {
    rowdefs: Arc<RowDefs>,
    group_tree: Arc<Tree>,
    cursor: Cursor,
    /// `None` scans the group tree in hierarchical-key order.
    index: Option<IndexDef>,
    covering: bool,
    descendants_projected: bool,
    direction: Direction,
    /// Smallest admissible key, inclusive. `None` is the tree edge.
    low: Option<StorageKey>,
    /// Smallest inadmissible key above the range. `None` is the tree edge.
    high: Option<StorageKey>,
    projection: ColumnBitmap,
    entry_limit: Option<usize>,
    entries_seen: usize,
    prev_hkey: Option<Vec<u8>>,
    pending: VecDeque<RowData>,
    scratch: Vec<u8>,
    started: bool,
    done: bool,
    stashed_error: Option<ArborError>,
    verbose: bool,
    session_id: u64,
}

impl RowCollector {
    pub(crate) fn open(
        store: &GroupStore,
        session: &Session,
        request: ScanRequest,
    ) -> ArborResult<Self> {
        let schema = Arc::clone(store.schema());
        let rowdefs = Arc::clone(store.rowdefs());
        let root = rowdefs.rowdef(request.group)?.group_root();
        let flat_width = rowdefs.flat_width(root)?;
        if request.projection.len() != flat_width {
            return Err(ArborError::invalid_argument(format!(
                "projection bitmap has {} bits, group {root} has {flat_width} columns",
                request.projection.len()
            )));
        }
        let group_tree = store.group_tree(root)?;
        let root_pk = schema.table(root)?.pk_index();
        let flags = request.flags;

        // Resolve the ordering index: group/hkey order, or an index tree.
        let group_order = request.index.is_group_order() || request.index == root_pk;
        let (index, scan_tree, bound_columns, bound_prefix) = if group_order {
            let columns = schema.table(root)?.hkey().columns().to_vec();
            let prefix = rowdefs.rowdef(root)?.ordinal().to_be_bytes().to_vec();
            (None, Arc::clone(&group_tree), columns, prefix)
        } else {
            let index = schema.index(request.index)?.clone();
            if rowdefs.rowdef(index.table())?.group_root() != root {
                return Err(ArborError::invalid_argument(format!(
                    "index {} does not belong to group {root}",
                    index.id()
                )));
            }
            let tree = store.index_tree(index.id())?;
            let columns = index.columns().to_vec();
            (Some(index), tree, columns, Vec::new())
        };

        let (covering, descendants_projected) = match &index {
            None => (false, false),
            Some(index) => {
                let descendants = rowdefs.group_order(root)?.iter().any(|&t| {
                    rowdefs.is_strict_ancestor(index.table(), t)
                        && request
                            .projection
                            .table_projected(&rowdefs, t)
                            .unwrap_or(false)
                });
                let covering = !descendants
                    && Self::is_covering(&schema, &rowdefs, root, index, &request.projection)?;
                (covering, descendants)
            }
        };

        let start_bound = Self::encode_bound(
            &schema,
            &bound_columns,
            &bound_prefix,
            request.start.as_ref(),
            flags.contains(ScanFlags::START_AT_EDGE),
            flags.contains(ScanFlags::PREFIX),
        )?;
        let end_bound = Self::encode_bound(
            &schema,
            &bound_columns,
            &bound_prefix,
            request.end.as_ref(),
            flags.contains(ScanFlags::END_AT_EDGE),
            flags.contains(ScanFlags::PREFIX),
        )?;

        let descending = flags.descending();
        let start_excl = flags.contains(ScanFlags::START_EXCLUSIVE);
        let end_excl = flags.contains(ScanFlags::END_EXCLUSIVE);
        let mut empty_range = false;

        // Under DESCENDING the logical start is the physical high edge.
        let (mut low, mut high) = if descending {
            let high = match &start_bound {
                None => None,
                Some(s) if start_excl => Some(s.clone()),
                Some(s) => nonempty(s.prefix_successor()),
            };
            let low = match &end_bound {
                None => None,
                Some(e) if end_excl => match nonempty(e.prefix_successor()) {
                    Some(key) => Some(key),
                    None => {
                        empty_range = true;
                        None
                    }
                },
                Some(e) => Some(e.clone()),
            };
            (low, high)
        } else {
            let low = match &start_bound {
                None => None,
                Some(s) if start_excl => match nonempty(s.prefix_successor()) {
                    Some(key) => Some(key),
                    None => {
                        empty_range = true;
                        None
                    }
                },
                Some(s) => Some(s.clone()),
            };
            let high = match &end_bound {
                None => None,
                Some(e) if end_excl => Some(e.clone()),
                Some(e) => nonempty(e.prefix_successor()),
            };
            (low, high)
        };

        // An equality probe restricts the scan to the probe's prefix
        // family; with no bound supplied it stops after the first entry.
        let mut entry_limit = None;
        if flags.single_row() {
            match start_bound.as_ref().or(end_bound.as_ref()) {
                Some(probe) => {
                    if low.as_ref().map_or(true, |l| l < probe) {
                        low = Some(probe.clone());
                    }
                    if let Some(succ) = nonempty(probe.prefix_successor()) {
                        if high.as_ref().map_or(true, |h| *h > succ) {
                            high = Some(succ);
                        }
                    }
                }
                None => entry_limit = Some(1),
            }
        }

        let cursor = store.space().open_cursor(scan_tree)?;
        let mut collector = Self {
            rowdefs,
            group_tree,
            cursor,
            index,
            covering,
            descendants_projected,
            direction: if descending {
                Direction::Backward
            } else {
                Direction::Forward
            },
            low,
            high,
            projection: request.projection,
            entry_limit,
            entries_seen: 0,
            prev_hkey: None,
            pending: VecDeque::new(),
            scratch: Vec::with_capacity(ROW_BUFFER_INITIAL_CAPACITY),
            started: false,
            done: false,
            stashed_error: None,
            verbose: store.verbose_scans(),
            session_id: session.id(),
        };
        debug!(
            session = collector.session_id,
            tree = collector.cursor.tree().name(),
            covering = collector.covering,
            "scan opened"
        );
        if empty_range {
            collector.finish();
        }
        Ok(collector)
    }

    /// True if every projected column can be recovered from an index
    /// entry alone: the indexed columns plus the target's hkey columns.
    fn is_covering(
        schema: &Schema,
        rowdefs: &RowDefs,
        root: TableId,
        index: &IndexDef,
        projection: &ColumnBitmap,
    ) -> ArborResult<bool> {
        let mut available: Vec<ColumnRef> = index.columns().to_vec();
        available.extend_from_slice(schema.table(index.table())?.hkey().columns());
        for &table in rowdefs.group_order(root)? {
            let def = rowdefs.rowdef(table)?;
            for pos in 0..def.field_count() {
                if projection.get(def.flat_offset() + pos)
                    && !available.contains(&ColumnRef::new(table, pos as u16))
                {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Encodes the populated leading bound fields against the scan's
    /// ordering columns. `None` means edge semantics on that side.
    ///
    /// Bound field `i` binds ordering column `i`; the walk stops at the
    /// first NULL field, so a partial bound is a prefix bound.
    fn encode_bound(
        schema: &Schema,
        columns: &[ColumnRef],
        prefix: &[u8],
        bound: Option<&RowData>,
        at_edge: bool,
        prefix_match: bool,
    ) -> ArborResult<Option<StorageKey>> {
        if at_edge {
            return Ok(None);
        }
        let Some(row) = bound else {
            return Ok(None);
        };
        let mut populated = 0;
        while populated < columns.len() && row.field(populated as u16).is_some() {
            populated += 1;
        }
        if populated == 0 {
            return Ok(None);
        }
        let mut key = prefix.to_vec();
        for (i, column) in columns.iter().take(populated).enumerate() {
            let field = row.field(i as u16).expect("field checked populated");
            let declared = schema.column_type(*column)?;
            if field.column_type() != declared {
                return Err(ArborError::FieldTypeMismatch {
                    expected: declared.name(),
                    actual: field.column_type().name(),
                });
            }
            encode_key_field(Some(field), prefix_match && i + 1 == populated, &mut key);
        }
        Ok(Some(StorageKey::from_vec(key)))
    }

    /// Returns true if another row will be produced.
    ///
    /// Truthful via one-row lookahead. A storage failure during lookahead
    /// marks the collector done; the failure itself surfaces on the next
    /// [`RowCollector::collect_next_row`] call.
    pub fn has_more(&mut self) -> bool {
        if self.stashed_error.is_some() {
            return false;
        }
        if !self.pending.is_empty() {
            return true;
        }
        if self.done {
            return false;
        }
        match self.fill_pending() {
            Ok(()) => {
                if self.pending.is_empty() {
                    self.finish();
                    false
                } else {
                    true
                }
            }
            Err(err) => {
                self.finish();
                self.stashed_error = Some(err);
                false
            }
        }
    }

    /// Returns the next row as a decoded value, or `None` when exhausted.
    pub fn next_row(&mut self) -> ArborResult<Option<RowData>> {
        if let Some(err) = self.stashed_error.take() {
            return Err(err);
        }
        if self.pending.is_empty() && !self.done {
            if let Err(err) = self.fill_pending() {
                self.finish();
                return Err(err);
            }
        }
        match self.pending.pop_front() {
            Some(row) => Ok(Some(row)),
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    /// Appends the next row's encoded bytes into `buffer`.
    ///
    /// Returns whether a row was produced. Either a full row is appended
    /// or the buffer is untouched.
    pub fn collect_next_row(&mut self, buffer: &mut BytesMut) -> ArborResult<bool> {
        match self.next_row()? {
            Some(row) => {
                self.scratch.clear();
                encode_row(&row, &mut self.scratch);
                buffer.extend_from_slice(&self.scratch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Releases the collector's storage resources. Idempotent; `Drop` of
    /// the underlying cursor is the backstop for early abandonment.
    pub fn close(&mut self) {
        self.pending.clear();
        self.finish();
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.cursor.release();
            debug!(session = self.session_id, "scan finished");
        }
    }

    /// Advances until at least one row is pending or the scan is done.
    fn fill_pending(&mut self) -> ArborResult<()> {
        while self.pending.is_empty() && !self.done {
            match self.next_raw_entry()? {
                None => self.finish(),
                Some((key, value)) => self.produce_rows(&key, &value)?,
            }
        }
        Ok(())
    }

    /// Steps the cursor to the next admissible entry of the scan tree.
    fn next_raw_entry(&mut self) -> ArborResult<Option<(StorageKey, StorageValue)>> {
        if let Some(limit) = self.entry_limit {
            if self.entries_seen >= limit {
                return Ok(None);
            }
        }
        let entry = if self.started {
            self.cursor.step(self.direction)?
        } else {
            self.started = true;
            match self.direction {
                Direction::Forward => {
                    let low = self.low.clone();
                    self.cursor.seek(low.as_ref(), Direction::Forward)?
                }
                Direction::Backward => match self.high.clone() {
                    // The high limit is exclusive: position on the last
                    // key strictly below it.
                    None => self.cursor.seek(None, Direction::Backward)?,
                    Some(h) => {
                        let mut entry = self.cursor.seek(Some(&h), Direction::Backward)?;
                        if matches!(&entry, Some((k, _)) if *k >= h) {
                            entry = self.cursor.step(Direction::Backward)?;
                        }
                        entry
                    }
                },
            }
        };
        let Some((key, value)) = entry else {
            return Ok(None);
        };
        let admissible = match self.direction {
            Direction::Forward => self.high.as_ref().map_or(true, |h| key < *h),
            Direction::Backward => self.low.as_ref().map_or(true, |l| key >= *l),
        };
        if !admissible {
            return Ok(None);
        }
        self.entries_seen += 1;
        if self.verbose {
            trace!(session = self.session_id, key = ?key, "scan entry");
        }
        Ok(Some((key, value)))
    }

    fn produce_rows(&mut self, key: &StorageKey, value: &StorageValue) -> ArborResult<()> {
        match self.index.clone() {
            None => self.produce_group_row(key, value),
            Some(index) => self.produce_index_rows(&index, key),
        }
    }

    /// Group-order scan: each tree entry is one row of some table in the
    /// hierarchy; emit it if any of its columns is projected.
    fn produce_group_row(&mut self, key: &StorageKey, value: &StorageValue) -> ArborResult<()> {
        let rowdefs = Arc::clone(&self.rowdefs);
        let levels = rowdefs.parse_hkey(key.as_bytes())?;
        let table = levels.last().expect("hkey has at least one level").table;
        let def = rowdefs.rowdef(table)?;
        if !self.projection.any_in_range(def.flat_offset(), def.field_count()) {
            return Ok(());
        }
        let mut row = decode_row(value.as_bytes())?;
        if row.table() != table {
            return Err(ArborError::corrupt(
                "row payload table does not match its hkey",
            ));
        }
        self.apply_projection(&mut row, def.flat_offset(), def.field_count());
        self.pending.push_back(row);
        Ok(())
    }

    /// Index scan: split the entry into indexed fields and the target
    /// row's hkey, then emit the projected rows the entry contributes.
    fn produce_index_rows(&mut self, index: &IndexDef, key: &StorageKey) -> ArborResult<()> {
        let rowdefs = Arc::clone(&self.rowdefs);
        let bytes = key.as_bytes();
        let mut pos = 0;
        let mut index_fields = Vec::with_capacity(index.columns().len());
        for _ in index.columns() {
            index_fields.push(decode_key_field(bytes, &mut pos)?);
        }
        let hkey = &bytes[pos..];
        let levels = rowdefs.parse_hkey(hkey)?;
        if levels.last().expect("hkey has at least one level").table != index.table() {
            return Err(ArborError::corrupt(
                "index entry hkey does not end at the index's table",
            ));
        }
        if self.covering {
            self.produce_covering(index, &index_fields, hkey, &levels)?;
        } else {
            self.produce_from_group(hkey, &levels)?;
        }
        self.prev_hkey = Some(hkey.to_vec());
        Ok(())
    }

    /// Emits the projected rows for one index entry by dereferencing the
    /// group tree: ancestors in hierarchical order, then the target row,
    /// then (when projected) the target's subtree.
    fn produce_from_group(&mut self, hkey: &[u8], levels: &[HKeyLevel]) -> ArborResult<()> {
        let rowdefs = Arc::clone(&self.rowdefs);
        for (depth, level) in levels.iter().enumerate() {
            let def = rowdefs.rowdef(level.table)?;
            if !self.projection.any_in_range(def.flat_offset(), def.field_count()) {
                continue;
            }
            let is_target = depth + 1 == levels.len();
            // An ancestor shared with the previous entry was already
            // emitted; a branch's rows are never reordered or repeated.
            if !is_target && self.same_as_previous(hkey, level.end) {
                continue;
            }
            let value = self
                .group_tree
                .get(&StorageKey::from_bytes(&hkey[..level.end]))?
                .ok_or_else(|| {
                    ArborError::corrupt("index entry references a missing group row")
                })?;
            let mut row = decode_row(value.as_bytes())?;
            self.apply_projection(&mut row, def.flat_offset(), def.field_count());
            self.pending.push_back(row);
        }

        if self.descendants_projected {
            let mut position = StorageKey::from_bytes(hkey);
            loop {
                let Some((key, value)) = self.group_tree.next_from(Some(&position), false)? else {
                    break;
                };
                if !key.starts_with(hkey) {
                    break;
                }
                let sub_levels = rowdefs.parse_hkey(key.as_bytes())?;
                let table = sub_levels.last().expect("hkey has at least one level").table;
                let def = rowdefs.rowdef(table)?;
                if self.projection.any_in_range(def.flat_offset(), def.field_count()) {
                    let mut row = decode_row(value.as_bytes())?;
                    self.apply_projection(&mut row, def.flat_offset(), def.field_count());
                    self.pending.push_back(row);
                }
                position = key;
            }
        }
        Ok(())
    }

    /// Covering fast path: synthesizes the projected rows from the index
    /// entry alone, without dereferencing the group tree.
    fn produce_covering(
        &mut self,
        index: &IndexDef,
        index_fields: &[Option<Field>],
        hkey: &[u8],
        levels: &[HKeyLevel],
    ) -> ArborResult<()> {
        let rowdefs = Arc::clone(&self.rowdefs);
        for (depth, level) in levels.iter().enumerate() {
            let def = rowdefs.rowdef(level.table)?;
            if !self.projection.any_in_range(def.flat_offset(), def.field_count()) {
                continue;
            }
            let is_target = depth + 1 == levels.len();
            if !is_target && self.same_as_previous(hkey, level.end) {
                continue;
            }
            let mut row = RowData::new(level.table, def.field_count());
            for pos in 0..def.field_count() {
                if !self.projection.get(def.flat_offset() + pos) {
                    continue;
                }
                let column = ColumnRef::new(level.table, pos as u16);
                if let Some(field) = entry_field(&rowdefs, index, index_fields, levels, column) {
                    row.set_field(pos as u16, field);
                }
            }
            self.pending.push_back(row);
        }
        Ok(())
    }

    fn same_as_previous(&self, hkey: &[u8], end: usize) -> bool {
        self.prev_hkey
            .as_ref()
            .map_or(false, |prev| prev.len() >= end && prev[..end] == hkey[..end])
    }

    fn apply_projection(&self, row: &mut RowData, flat_offset: usize, field_count: usize) {
        for pos in 0..field_count {
            if !self.projection.get(flat_offset + pos) {
                row.clear_field(pos as u16);
            }
        }
    }
}

fn nonempty(key: StorageKey) -> Option<StorageKey> {
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Recovers one column value from an index entry: from the indexed
/// fields when the column is indexed, from the hkey when it is part of
/// some level's primary key.
fn entry_field(
    rowdefs: &RowDefs,
    index: &IndexDef,
    index_fields: &[Option<Field>],
    levels: &[HKeyLevel],
    column: ColumnRef,
) -> Option<Field> {
    if let Some(i) = index.columns().iter().position(|&c| c == column) {
        return index_fields[i].clone();
    }
    for level in levels {
        if level.table != column.table {
            continue;
        }
        let def = rowdefs.rowdef(level.table).ok()?;
        if let Some(idx) = def
            .primary_key()
            .iter()
            .position(|&p| p == column.position)
        {
            return Some(level.pk_fields[idx].clone());
        }
    }
    None
}
