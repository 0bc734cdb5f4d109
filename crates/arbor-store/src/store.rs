//! The group store.
//!
//! A [`GroupStore`] owns the trees of one schema generation: one group
//! tree per root table (rows of the whole hierarchy, interleaved in
//! hierarchical-key order) and one index tree per primary-key or
//! secondary index. It exposes the write path, the index maintenance
//! surface, and [`GroupStore::open_scan`].
//!
//! Index-tree layout: an entry's key is the indexed field values in
//! index-column order followed by the target row's full hierarchical key;
//! the value is empty. The appended hkey keeps non-unique entries
//! distinct and is the back-reference the scan engine follows to the
//! group tree.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use arbor_common::config::StoreConfig;
use arbor_common::constants::{GROUP_TREE_PREFIX, INDEX_TREE_PREFIX, TREE_NAME_SEPARATOR};
use arbor_common::error::{ArborError, ArborResult};
use arbor_common::types::{ColumnRef, IndexId, StorageKey, StorageValue, TableId};
use arbor_schema::{IndexDef, Schema};
use tracing::{debug, info};

use crate::row::{decode_row, encode_key_field, encode_row, skip_key_field, Field, RowData, RowDefs};
use crate::scan::{RowCollector, ScanRequest};
use crate::session::Session;
use crate::treespace::{Direction, Tree, TreeSpace};

/// The storage-and-execution core for one schema generation.
#[derive(Debug)]
pub struct GroupStore {
    schema: Arc<Schema>,
    rowdefs: Arc<RowDefs>,
    space: Arc<TreeSpace>,
    max_key_size: usize,
    max_row_size: usize,
    deferred_indexes: AtomicBool,
    verbose_scans: AtomicBool,
}

impl GroupStore {
    /// Creates a stopped store for a schema.
    pub fn new(config: &StoreConfig, schema: Schema) -> ArborResult<Self> {
        config.validate().map_err(ArborError::invalid_argument)?;
        let rowdefs = RowDefs::build(&schema)?;
        Ok(Self {
            schema: Arc::new(schema),
            rowdefs: Arc::new(rowdefs),
            space: Arc::new(TreeSpace::new(config)),
            max_key_size: config.max_key_size,
            max_row_size: config.max_row_size,
            deferred_indexes: AtomicBool::new(config.deferred_index_builds),
            verbose_scans: AtomicBool::new(config.verbose_scans),
        })
    }

    /// Starts the store. Idempotent.
    pub fn start(&self) {
        self.space.start();
    }

    /// Stops the store; subsequent operations fail with `StoreStopped`.
    pub fn stop(&self) {
        self.space.stop();
    }

    /// Returns the schema this store serves.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the row-definition cache.
    #[must_use]
    pub fn rowdefs(&self) -> &Arc<RowDefs> {
        &self.rowdefs
    }

    /// Returns the underlying tree space handle.
    #[must_use]
    pub fn space(&self) -> &Arc<TreeSpace> {
        &self.space
    }

    fn group_tree_name(&self, root: TableId) -> String {
        let schema = self.space.schema_name();
        format!("{GROUP_TREE_PREFIX}{TREE_NAME_SEPARATOR}{schema}{TREE_NAME_SEPARATOR}{root}")
    }

    fn index_tree_name(&self, index: IndexId) -> String {
        let schema = self.space.schema_name();
        format!("{INDEX_TREE_PREFIX}{TREE_NAME_SEPARATOR}{schema}{TREE_NAME_SEPARATOR}{index}")
    }

    pub(crate) fn group_tree(&self, root: TableId) -> ArborResult<Arc<Tree>> {
        self.space.ensure_tree(&self.group_tree_name(root))
    }

    pub(crate) fn index_tree(&self, index: IndexId) -> ArborResult<Arc<Tree>> {
        self.space.ensure_tree(&self.index_tree_name(index))
    }

    // =========================================================================
    // Management surface
    // =========================================================================

    /// While set, `write_row`/`delete_row` skip secondary-index
    /// maintenance; [`GroupStore::flush_deferred_indexes`] catches up.
    ///
    /// Safe to toggle at any time: open collectors capture their tree
    /// handles at open and are unaffected.
    pub fn set_deferred_index_building(&self, deferred: bool) {
        self.deferred_indexes.store(deferred, AtomicOrdering::SeqCst);
        info!(deferred, "deferred index building toggled");
    }

    /// Returns true if secondary-index maintenance is currently deferred.
    #[must_use]
    pub fn index_building_deferred(&self) -> bool {
        self.deferred_indexes.load(AtomicOrdering::SeqCst)
    }

    /// Raises or lowers per-entry scan logging detail.
    pub fn set_verbose_logging(&self, verbose: bool) {
        self.verbose_scans.store(verbose, AtomicOrdering::SeqCst);
        info!(verbose, "verbose scan logging toggled");
    }

    pub(crate) fn verbose_scans(&self) -> bool {
        self.verbose_scans.load(AtomicOrdering::SeqCst)
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Computes the full hierarchical key of a row, validating its shape.
    ///
    /// Non-root rows resolve their parent's hkey through the parent
    /// table's primary-key index, so parents must be written before their
    /// children.
    fn encode_hkey(&self, row: &RowData) -> ArborResult<Vec<u8>> {
        let rowdef = self.rowdefs.rowdef(row.table())?;
        rowdef.check_shape(row)?;
        let mut key = match rowdef.parent() {
            None => Vec::new(),
            Some(parent) => self.resolve_parent_hkey(parent, rowdef.parent_join(), row)?,
        };
        rowdef.append_own_level(row, &mut key);
        if key.len() > self.max_key_size {
            return Err(ArborError::KeyTooLarge {
                size: key.len(),
                max: self.max_key_size,
            });
        }
        Ok(key)
    }

    fn resolve_parent_hkey(
        &self,
        parent: TableId,
        parent_join: &[u16],
        row: &RowData,
    ) -> ArborResult<Vec<u8>> {
        let parent_def = self.rowdefs.rowdef(parent)?;
        let mut probe = Vec::new();
        for &pos in parent_join {
            encode_key_field(row.field(pos), false, &mut probe);
        }
        let tree = self.index_tree(parent_def.pk_index())?;
        let (entry_key, _) = tree
            .first_with_prefix(&StorageKey::from_vec(probe))?
            .ok_or_else(|| {
                ArborError::invalid_argument(format!(
                    "table {}: no parent row in table {parent} matches the join fields",
                    row.table()
                ))
            })?;
        // An index key is the indexed fields followed by the row's hkey.
        let bytes = entry_key.as_bytes();
        let mut pos = 0;
        for _ in 0..parent_def.primary_key().len() {
            skip_key_field(bytes, &mut pos)?;
        }
        Ok(bytes[pos..].to_vec())
    }

    /// Builds the index-tree key for one row.
    fn index_entry_key(&self, index: &IndexDef, row: &RowData, hkey: &[u8]) -> ArborResult<Vec<u8>> {
        let mut key = Vec::new();
        for column in index.columns() {
            if column.table == row.table() {
                encode_key_field(row.field(column.position), false, &mut key);
            } else {
                let field = self.ancestor_field(*column, hkey)?;
                encode_key_field(field.as_ref(), false, &mut key);
            }
        }
        key.extend_from_slice(hkey);
        Ok(key)
    }

    /// Reads an ancestor-level column value for a group-index entry: from
    /// the hkey when the column is part of that level's primary key, from
    /// the stored ancestor row otherwise.
    fn ancestor_field(&self, column: ColumnRef, hkey: &[u8]) -> ArborResult<Option<Field>> {
        let levels = self.rowdefs.parse_hkey(hkey)?;
        let level = levels
            .iter()
            .find(|l| l.table == column.table)
            .ok_or_else(|| {
                ArborError::invalid_argument(format!(
                    "column {column} is not on the row's ancestor chain"
                ))
            })?;
        let level_def = self.rowdefs.rowdef(level.table)?;
        if let Some(idx) = level_def
            .primary_key()
            .iter()
            .position(|&p| p == column.position)
        {
            return Ok(Some(level.pk_fields[idx].clone()));
        }
        let tree = self.group_tree(level_def.group_root())?;
        let value = tree
            .get(&StorageKey::from_bytes(&hkey[..level.end]))?
            .ok_or_else(|| ArborError::corrupt("hkey references a missing ancestor row"))?;
        let ancestor = decode_row(value.as_bytes())?;
        Ok(ancestor.field(column.position).cloned())
    }

    /// Inserts one row.
    ///
    /// Writes the group tree and maintains the owning table's indexes:
    /// the primary-key index always (child writes resolve parentage
    /// through it), secondary indexes unless maintenance is deferred.
    pub fn write_row(&self, session: &Session, row: &RowData) -> ArborResult<()> {
        let rowdef = self.rowdefs.rowdef(row.table())?;
        let hkey = self.encode_hkey(row)?;
        let mut payload = Vec::new();
        encode_row(row, &mut payload);
        if payload.len() > self.max_row_size {
            return Err(ArborError::invalid_argument(format!(
                "encoded row size {} exceeds maximum {}",
                payload.len(),
                self.max_row_size
            )));
        }
        let group_tree = self.group_tree(rowdef.group_root())?;
        let pk_index = self.schema.index(rowdef.pk_index())?;
        let pk_tree = self.index_tree(pk_index.id())?;
        let pk_entry = self.index_entry_key(pk_index, row, &hkey)?;
        let mut secondary_entries = Vec::new();
        if !self.index_building_deferred() {
            for &index_id in rowdef.secondary_indexes() {
                let index = self.schema.index(index_id)?;
                let entry = self.index_entry_key(index, row, &hkey)?;
                secondary_entries.push((self.index_tree(index_id)?, entry));
            }
        }

        self.space.transact(|txn| {
            let key = StorageKey::from_vec(hkey.clone());
            if txn.get(&group_tree, &key)?.is_some() {
                return Err(ArborError::DuplicateRow {
                    table_id: row.table(),
                });
            }
            txn.put(&group_tree, key, StorageValue::from_vec(payload.clone()));
            txn.put(
                &pk_tree,
                StorageKey::from_vec(pk_entry.clone()),
                StorageValue::empty(),
            );
            for (tree, entry) in &secondary_entries {
                txn.put(tree, StorageKey::from_vec(entry.clone()), StorageValue::empty());
            }
            Ok(())
        })?;
        debug!(session = session.id(), table = %row.table(), "row written");
        Ok(())
    }

    /// Removes one row and its index entries.
    pub fn delete_row(&self, session: &Session, row: &RowData) -> ArborResult<()> {
        let rowdef = self.rowdefs.rowdef(row.table())?;
        let hkey = self.encode_hkey(row)?;
        let group_tree = self.group_tree(rowdef.group_root())?;
        let pk_index = self.schema.index(rowdef.pk_index())?;
        let pk_tree = self.index_tree(pk_index.id())?;
        let pk_entry = self.index_entry_key(pk_index, row, &hkey)?;
        let mut secondary_entries = Vec::new();
        if !self.index_building_deferred() {
            for &index_id in rowdef.secondary_indexes() {
                let index = self.schema.index(index_id)?;
                let entry = self.index_entry_key(index, row, &hkey)?;
                secondary_entries.push((self.index_tree(index_id)?, entry));
            }
        }

        self.space.transact(|txn| {
            let key = StorageKey::from_vec(hkey.clone());
            if txn.get(&group_tree, &key)?.is_none() {
                return Err(ArborError::invalid_argument(format!(
                    "table {}: row not found",
                    row.table()
                )));
            }
            txn.delete(&group_tree, key);
            txn.delete(&pk_tree, StorageKey::from_vec(pk_entry.clone()));
            for (tree, entry) in &secondary_entries {
                txn.delete(tree, StorageKey::from_vec(entry.clone()));
            }
            Ok(())
        })?;
        debug!(session = session.id(), table = %row.table(), "row deleted");
        Ok(())
    }

    // =========================================================================
    // Index maintenance
    // =========================================================================

    /// Drops the contents of every secondary-index tree.
    ///
    /// Primary-key trees stay: child writes resolve parentage through
    /// them. Index-driven scans opened after this call match nothing
    /// until [`GroupStore::build_indexes`] runs.
    pub fn delete_indexes(&self, session: &Session) -> ArborResult<()> {
        for index in self.schema.indexes() {
            if index.is_primary_key() {
                continue;
            }
            self.index_tree(index.id())?.clear();
        }
        info!(session = session.id(), "secondary indexes deleted");
        Ok(())
    }

    /// Rebuilds every secondary-index tree from the group trees.
    ///
    /// Safe to call at any time, including after
    /// [`GroupStore::delete_indexes`] or a deferred-write burst.
    pub fn build_indexes(&self, session: &Session) -> ArborResult<()> {
        for index in self.schema.indexes() {
            if !index.is_primary_key() {
                self.index_tree(index.id())?.clear();
            }
        }
        for &root in self.schema.roots() {
            let group_tree = self.group_tree(root)?;
            let mut cursor = self.space.open_cursor(Arc::clone(&group_tree))?;
            let mut entry = cursor.seek(None, Direction::Forward)?;
            while let Some((key, value)) = entry {
                let row = decode_row(value.as_bytes())?;
                let rowdef = self.rowdefs.rowdef(row.table())?;
                for &index_id in rowdef.secondary_indexes() {
                    let index = self.schema.index(index_id)?;
                    let entry_key = self.index_entry_key(index, &row, key.as_bytes())?;
                    self.index_tree(index_id)?.apply(&[(
                        StorageKey::from_vec(entry_key),
                        Some(StorageValue::empty()),
                    )]);
                }
                entry = cursor.step(Direction::Forward)?;
            }
            cursor.release();
        }
        info!(session = session.id(), "secondary indexes rebuilt");
        Ok(())
    }

    /// Catches index trees up after a deferred-write burst.
    pub fn flush_deferred_indexes(&self, session: &Session) -> ArborResult<()> {
        self.build_indexes(session)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Opens a scan and returns its pull-based collector.
    pub fn open_scan(&self, session: &Session, request: ScanRequest) -> ArborResult<RowCollector> {
        RowCollector::open(self, session, request)
    }
}
