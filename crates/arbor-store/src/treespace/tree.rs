//! Trees and the tree space.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use arbor_common::config::StoreConfig;
use arbor_common::error::{ArborError, ArborResult};
use arbor_common::types::{StorageKey, StorageValue};
use parking_lot::RwLock;
use tracing::debug;

use super::cursor::Cursor;
use super::txn::Txn;

/// One ordered tree of the space.
///
/// Readers never block each other; writers serialize per tree. The
/// version stamp increases on every committed write batch and is what
/// optimistic transactions validate against.
#[derive(Debug)]
pub struct Tree {
    name: String,
    entries: RwLock<BTreeMap<StorageKey, StorageValue>>,
    version: AtomicU64,
    faulted: AtomicBool,
}

impl Tree {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            faulted: AtomicBool::new(false),
        }
    }

    /// Returns the tree name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current version stamp.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(AtomicOrdering::SeqCst)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_fault(&self) -> ArborResult<()> {
        if self.faulted.load(AtomicOrdering::SeqCst) {
            return Err(ArborError::storage_fault(format!(
                "injected fault on tree '{}'",
                self.name
            )));
        }
        Ok(())
    }

    /// Testing hook: while set, every read on this tree fails with a
    /// storage fault. Used to exercise mid-stream scan failure handling.
    pub fn set_fault_injection(&self, enabled: bool) {
        self.faulted.store(enabled, AtomicOrdering::SeqCst);
    }

    /// Point lookup.
    pub fn get(&self, key: &StorageKey) -> ArborResult<Option<StorageValue>> {
        self.check_fault()?;
        Ok(self.entries.read().get(key).cloned())
    }

    /// Returns the first entry whose key starts with `prefix`.
    pub fn first_with_prefix(
        &self,
        prefix: &StorageKey,
    ) -> ArborResult<Option<(StorageKey, StorageValue)>> {
        self.check_fault()?;
        let entries = self.entries.read();
        Ok(entries
            .range::<StorageKey, _>((Bound::Included(prefix.clone()), Bound::Unbounded))
            .next()
            .filter(|(k, _)| k.starts_with(prefix.as_bytes()))
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Returns the first entry at or after `bound` (or strictly after when
    /// `inclusive` is false).
    pub(crate) fn next_from(
        &self,
        bound: Option<&StorageKey>,
        inclusive: bool,
    ) -> ArborResult<Option<(StorageKey, StorageValue)>> {
        self.check_fault()?;
        let entries = self.entries.read();
        let lower = match bound {
            None => Bound::Unbounded,
            Some(key) if inclusive => Bound::Included(key.clone()),
            Some(key) => Bound::Excluded(key.clone()),
        };
        Ok(entries
            .range::<StorageKey, _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Returns the last entry at or before `bound` (or strictly before
    /// when `inclusive` is false).
    pub(crate) fn prev_from(
        &self,
        bound: Option<&StorageKey>,
        inclusive: bool,
    ) -> ArborResult<Option<(StorageKey, StorageValue)>> {
        self.check_fault()?;
        let entries = self.entries.read();
        let upper = match bound {
            None => Bound::Unbounded,
            Some(key) if inclusive => Bound::Included(key.clone()),
            Some(key) => Bound::Excluded(key.clone()),
        };
        Ok(entries
            .range::<StorageKey, _>((Bound::Unbounded, upper))
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Applies a committed write batch and bumps the version stamp.
    ///
    /// Callers must already hold the space-level commit ordering; this
    /// only serializes against readers of this tree.
    pub(crate) fn apply(&self, writes: &[(StorageKey, Option<StorageValue>)]) {
        let mut entries = self.entries.write();
        for (key, value) in writes {
            match value {
                Some(v) => {
                    entries.insert(key.clone(), v.clone());
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        self.version.fetch_add(1, AtomicOrdering::SeqCst);
    }

    /// Removes every entry, bumping the version stamp.
    pub(crate) fn clear(&self) {
        self.entries.write().clear();
        self.version.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

/// The tree space: every tree of one store, keyed by name.
///
/// Has an explicit start/stop lifecycle and is always passed by handle;
/// there is no ambient global instance.
#[derive(Debug)]
pub struct TreeSpace {
    schema_name: String,
    trees: RwLock<HashMap<String, Arc<Tree>>>,
    running: AtomicBool,
    max_txn_retries: usize,
    open_cursors: Arc<AtomicUsize>,
}

impl TreeSpace {
    /// Creates a stopped tree space from configuration.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            schema_name: config.schema_name.clone(),
            trees: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            max_txn_retries: config.max_txn_retries,
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the schema name this space serves.
    #[must_use]
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Starts the space. Idempotent.
    pub fn start(&self) {
        if !self.running.swap(true, AtomicOrdering::SeqCst) {
            debug!(schema = %self.schema_name, "tree space started");
        }
    }

    /// Stops the space. Subsequent operations fail with `StoreStopped`.
    pub fn stop(&self) {
        if self.running.swap(false, AtomicOrdering::SeqCst) {
            debug!(schema = %self.schema_name, "tree space stopped");
        }
    }

    /// Returns true if the space is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(AtomicOrdering::SeqCst)
    }

    fn check_running(&self) -> ArborResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ArborError::StoreStopped)
        }
    }

    /// Returns an existing tree.
    pub fn tree(&self, name: &str) -> ArborResult<Arc<Tree>> {
        self.check_running()?;
        self.trees
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ArborError::TreeNotFound {
                name: name.to_string(),
            })
    }

    /// Returns a tree, creating it if absent.
    pub fn ensure_tree(&self, name: &str) -> ArborResult<Arc<Tree>> {
        self.check_running()?;
        if let Some(tree) = self.trees.read().get(name) {
            return Ok(Arc::clone(tree));
        }
        let mut trees = self.trees.write();
        Ok(Arc::clone(
            trees
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Tree::new(name))),
        ))
    }

    /// Returns all tree names in unspecified order.
    #[must_use]
    pub fn tree_names(&self) -> Vec<String> {
        self.trees.read().keys().cloned().collect()
    }

    /// Opens a traversal cursor over a tree.
    ///
    /// The cursor counts against the space's open-cursor gauge until it is
    /// released (or dropped).
    pub fn open_cursor(&self, tree: Arc<Tree>) -> ArborResult<Cursor> {
        self.check_running()?;
        Ok(Cursor::new(tree, Arc::clone(&self.open_cursors)))
    }

    /// Returns the number of cursors currently open.
    ///
    /// Test seam for the release-exactly-once discipline.
    #[must_use]
    pub fn open_cursor_count(&self) -> usize {
        self.open_cursors.load(AtomicOrdering::SeqCst)
    }

    /// Runs a closure transactionally with bounded optimistic retry.
    ///
    /// The closure may be invoked several times; on each attempt it gets a
    /// fresh [`Txn`]. Version conflicts retry up to the configured budget
    /// and then surface as `RetriesExhausted`. Any other error aborts the
    /// attempt immediately.
    pub fn transact<T>(&self, mut body: impl FnMut(&mut Txn<'_>) -> ArborResult<T>) -> ArborResult<T> {
        self.check_running()?;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut txn = Txn::new(self);
            match body(&mut txn).and_then(|value| txn.commit().map(|()| value)) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempts < self.max_txn_retries => {
                    debug!(schema = %self.schema_name, attempts, "transaction retry: {err}");
                }
                Err(err) if err.is_retryable() => {
                    return Err(ArborError::RetriesExhausted { attempts });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
