//! Exchange-style tree cursors.
//!
//! A cursor steps through one tree in either direction. Every step
//! re-reads under the tree's read lock and never holds the lock between
//! steps, so long scans do not starve concurrent sessions.

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use arbor_common::error::ArborResult;
use arbor_common::types::{StorageKey, StorageValue};

use super::tree::Tree;

/// Direction of cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending key order.
    Forward,
    /// Descending key order.
    Backward,
}

/// A traversal cursor over one tree.
///
/// Holds a storage resource that must be released exactly once; the
/// owning space's open-cursor gauge tracks the obligation and `Drop`
/// releases as a backstop.
#[derive(Debug)]
pub struct Cursor {
    tree: Arc<Tree>,
    position: Option<StorageKey>,
    released: bool,
    gauge: Arc<AtomicUsize>,
}

impl Cursor {
    pub(crate) fn new(tree: Arc<Tree>, gauge: Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, AtomicOrdering::SeqCst);
        Self {
            tree,
            position: None,
            released: false,
            gauge,
        }
    }

    /// Returns the tree this cursor traverses.
    #[must_use]
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// Positions at the first entry at-or-after `bound` (forward) or
    /// at-or-before it (backward); `None` means the tree edge.
    ///
    /// Returns the entry found, if any, and leaves the cursor positioned
    /// on it.
    pub fn seek(
        &mut self,
        bound: Option<&StorageKey>,
        direction: Direction,
    ) -> ArborResult<Option<(StorageKey, StorageValue)>> {
        let entry = match direction {
            Direction::Forward => self.tree.next_from(bound, true)?,
            Direction::Backward => self.tree.prev_from(bound, true)?,
        };
        self.position = entry.as_ref().map(|(k, _)| k.clone());
        Ok(entry)
    }

    /// Steps to the next entry in `direction` from the current position.
    ///
    /// Must be called after a successful [`Cursor::seek`].
    pub fn step(
        &mut self,
        direction: Direction,
    ) -> ArborResult<Option<(StorageKey, StorageValue)>> {
        let entry = match direction {
            Direction::Forward => self.tree.next_from(self.position.as_ref(), false)?,
            Direction::Backward => self.tree.prev_from(self.position.as_ref(), false)?,
        };
        if let Some((key, _)) = entry.as_ref() {
            self.position = Some(key.clone());
        }
        Ok(entry)
    }

    /// Releases the cursor's storage resource. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.gauge.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::config::StoreConfig;

    use crate::treespace::TreeSpace;

    fn key(bytes: &[u8]) -> StorageKey {
        StorageKey::from_bytes(bytes)
    }

    fn populated() -> (TreeSpace, Arc<Tree>) {
        let space = TreeSpace::new(&StoreConfig::for_testing());
        space.start();
        let tree = space.ensure_tree("grp.t.1").unwrap();
        for i in 1..=5u8 {
            tree.apply(&[(key(&[i]), Some(StorageValue::from_bytes(&[i])))]);
        }
        (space, tree)
    }

    #[test]
    fn test_forward_walk() {
        let (space, tree) = populated();
        let mut cursor = space.open_cursor(tree).unwrap();
        let mut seen = Vec::new();
        let mut entry = cursor.seek(None, Direction::Forward).unwrap();
        while let Some((k, _)) = entry {
            seen.push(k.as_bytes()[0]);
            entry = cursor.step(Direction::Forward).unwrap();
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_backward_walk_from_bound() {
        let (space, tree) = populated();
        let mut cursor = space.open_cursor(tree).unwrap();
        let mut seen = Vec::new();
        let mut entry = cursor.seek(Some(&key(&[4])), Direction::Backward).unwrap();
        while let Some((k, _)) = entry {
            seen.push(k.as_bytes()[0]);
            entry = cursor.step(Direction::Backward).unwrap();
        }
        assert_eq!(seen, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_seek_between_keys() {
        let (space, tree) = populated();
        tree.apply(&[(key(&[3]), None)]);
        let mut cursor = space.open_cursor(tree).unwrap();
        let entry = cursor.seek(Some(&key(&[3])), Direction::Forward).unwrap();
        assert_eq!(entry.unwrap().0.as_bytes(), &[4]);
    }

    #[test]
    fn test_step_sees_concurrent_insert_ahead() {
        let (space, tree) = populated();
        let mut cursor = space.open_cursor(Arc::clone(&tree)).unwrap();
        cursor.seek(Some(&key(&[2])), Direction::Forward).unwrap();
        tree.apply(&[(key(&[2, 1]), Some(StorageValue::from_bytes(b"mid")))]);
        let entry = cursor.step(Direction::Forward).unwrap();
        assert_eq!(entry.unwrap().0.as_bytes(), &[2, 1]);
    }
}
