//! Optimistic transactions.
//!
//! A transaction buffers writes and records, per touched tree, the
//! version stamp at first contact. Commit re-validates every recorded
//! version and then applies the buffered writes tree by tree in name
//! order. A failed validation surfaces as a retryable conflict which
//! [`super::TreeSpace::transact`] absorbs into its bounded retry loop.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_common::error::{ArborError, ArborResult};
use arbor_common::types::{StorageKey, StorageValue};

use super::tree::{Tree, TreeSpace};

/// One attempt of an optimistic transaction.
pub struct Txn<'a> {
    #[allow(dead_code)]
    space: &'a TreeSpace,
    read_versions: HashMap<String, (Arc<Tree>, u64)>,
    writes: Vec<(Arc<Tree>, StorageKey, Option<StorageValue>)>,
}

impl<'a> Txn<'a> {
    pub(crate) fn new(space: &'a TreeSpace) -> Self {
        Self {
            space,
            read_versions: HashMap::new(),
            writes: Vec::new(),
        }
    }

    fn record_read(&mut self, tree: &Arc<Tree>) {
        self.read_versions
            .entry(tree.name().to_string())
            .or_insert_with(|| (Arc::clone(tree), tree.version()));
    }

    fn overlay(&self, tree: &Arc<Tree>, key: &StorageKey) -> Option<Option<StorageValue>> {
        self.writes
            .iter()
            .rev()
            .find(|(t, k, _)| Arc::ptr_eq(t, tree) && k == key)
            .map(|(_, _, v)| v.clone())
    }

    /// Transactional point lookup; sees this transaction's own writes.
    pub fn get(&mut self, tree: &Arc<Tree>, key: &StorageKey) -> ArborResult<Option<StorageValue>> {
        self.record_read(tree);
        if let Some(buffered) = self.overlay(tree, key) {
            return Ok(buffered);
        }
        tree.get(key)
    }

    /// Transactional prefix probe: first committed entry whose key starts
    /// with `prefix`. Buffered writes are not merged into the result; use
    /// this only for keys the transaction does not itself modify.
    pub fn first_with_prefix(
        &mut self,
        tree: &Arc<Tree>,
        prefix: &StorageKey,
    ) -> ArborResult<Option<(StorageKey, StorageValue)>> {
        self.record_read(tree);
        tree.first_with_prefix(prefix)
    }

    /// Buffers an insert/overwrite.
    pub fn put(&mut self, tree: &Arc<Tree>, key: StorageKey, value: StorageValue) {
        self.writes.push((Arc::clone(tree), key, Some(value)));
    }

    /// Buffers a delete.
    pub fn delete(&mut self, tree: &Arc<Tree>, key: StorageKey) {
        self.writes.push((Arc::clone(tree), key, None));
    }

    /// Validates read versions and applies buffered writes.
    pub(crate) fn commit(self) -> ArborResult<()> {
        // Validate reads first; a stale tree means another session
        // committed since this attempt began.
        for (name, (tree, version)) in &self.read_versions {
            if tree.version() != *version {
                return Err(ArborError::TransactionConflict { tree: name.clone() });
            }
        }

        // Group writes per tree, preserving order within each tree, and
        // apply in name order so concurrent commits cannot interleave
        // inconsistently.
        let mut per_tree: HashMap<String, (Arc<Tree>, Vec<(StorageKey, Option<StorageValue>)>)> =
            HashMap::new();
        for (tree, key, value) in self.writes {
            per_tree
                .entry(tree.name().to_string())
                .or_insert_with(|| (Arc::clone(&tree), Vec::new()))
                .1
                .push((key, value));
        }
        let mut names: Vec<&String> = per_tree.keys().collect();
        names.sort();
        let names: Vec<String> = names.into_iter().cloned().collect();
        for name in names {
            if let Some((tree, writes)) = per_tree.get(&name) {
                tree.apply(writes);
            }
        }
        Ok(())
    }
}
