//! The multi-index enumerator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arbor_common::types::{ColumnRef, TableId};
use arbor_schema::{ColumnEquivalences, Schema};
use tracing::{debug, warn};

use crate::branch::BranchInfo;
use crate::candidate::MultiIndexCandidate;
use crate::node::IntersectionNode;

/// Enumerates the index pairs whose merge-intersection is a legal,
/// hierarchy-respecting access path.
///
/// Feed it one [`BranchInfo`] per hierarchy branch with
/// [`MultiIndexEnumerator::add_branch`], then call
/// [`MultiIndexEnumerator::get_combinations`]. A fresh enumerator must
/// be used per planning attempt; it holds no cross-call shared state.
pub struct MultiIndexEnumerator<'s, C> {
    schema: &'s Schema,
    leaves: Vec<Arc<IntersectionNode<C>>>,
    num_conditions: usize,
    duplicate_bindings: usize,
}

impl<'s, C: Clone> MultiIndexEnumerator<'s, C> {
    /// Creates an enumerator over one schema.
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            leaves: Vec::new(),
            num_conditions: 0,
            duplicate_bindings: 0,
        }
    }

    /// Adds one hierarchy branch: builds a candidate per index, pegging
    /// the maximal prefix of bindable columns, and keeps the candidates
    /// that peg at least one condition as leaves.
    ///
    /// A condition that maps to no column is logged and skipped. A
    /// second condition binding an already-bound column wins and bumps
    /// the duplicate-binding counter.
    pub fn add_branch<B: BranchInfo<Condition = C>>(&mut self, branch: &B) {
        let mut bindings: HashMap<ColumnRef, (C, usize)> = HashMap::new();
        for condition in branch.conditions() {
            let Some(column) = branch.column_of(condition) else {
                warn!("condition constrains no column; unusable for index pegging");
                continue;
            };
            let id = self.num_conditions;
            self.num_conditions += 1;
            if bindings.insert(column, (condition.clone(), id)).is_some() {
                self.duplicate_bindings += 1;
                warn!(%column, "duplicate condition binding for column; latest wins");
            }
        }
        for index in branch.indexes() {
            let Ok(target) = self.schema.table(index.table()) else {
                warn!(index = %index.id(), "index targets an unknown table; skipped");
                continue;
            };
            let candidate = MultiIndexCandidate::build(index, &bindings, target.hkey());
            if candidate.num_pegged() == 0 {
                debug!(index = %index.id(), "no pegged conditions; candidate discarded");
                continue;
            }
            self.leaves.push(Arc::new(IntersectionNode::Leaf(candidate)));
        }
    }

    /// Returns the leaf nodes built so far, in branch-addition and
    /// index-enumeration order.
    #[must_use]
    pub fn leaves(&self) -> &[Arc<IntersectionNode<C>>] {
        &self.leaves
    }

    /// Returns how many duplicate column bindings were seen.
    #[must_use]
    pub const fn duplicate_binding_count(&self) -> usize {
        self.duplicate_bindings
    }

    /// Breadth-first pairwise composition, iterated to a fix point.
    ///
    /// Each round pairs every node produced in the previous round against
    /// every node known so far. A pair is tried only when each side
    /// covers at least one condition the other does not: removals are
    /// taken out of a per-round residual set into scratch lists and
    /// merged back after the pairing, which keeps pairings independent
    /// while making the shared-set aliasing explicit. Iteration stops
    /// when a round synthesizes nothing new.
    ///
    /// Returns only the synthesized intersection nodes; the leaves are
    /// available from [`MultiIndexEnumerator::leaves`].
    pub fn get_combinations(
        &self,
        equivalences: &ColumnEquivalences,
    ) -> Vec<Arc<IntersectionNode<C>>> {
        let mut known = self.leaves.clone();
        let mut fresh = self.leaves.clone();
        let mut seen: HashSet<String> = HashSet::new();
        let mut results = Vec::new();

        while !fresh.is_empty() {
            let mut round = Vec::new();
            let mut residual = vec![true; self.num_conditions];
            for first in &fresh {
                for second in &known {
                    if Arc::ptr_eq(first, second) {
                        continue;
                    }
                    let removed_first = take_covered(&mut residual, first);
                    if !removed_first.is_empty() {
                        let removed_second = take_covered(&mut residual, second);
                        if !removed_second.is_empty() {
                            self.emit(first, second, equivalences, &mut seen, &mut round);
                        }
                        restore(&mut residual, &removed_second);
                    }
                    restore(&mut residual, &removed_first);
                }
            }
            if round.is_empty() {
                break;
            }
            known.extend(round.iter().cloned());
            results.extend(round.iter().cloned());
            fresh = round;
        }
        results
    }

    /// Attempts one intersection emission.
    ///
    /// The comparison columns are the pairwise-aligned leading ordering
    /// columns of the two sides; the pair is legal when they cover the
    /// full hierarchical key of the relevant ancestor. An illegal pair is
    /// silently pruned.
    fn emit(
        &self,
        first: &Arc<IntersectionNode<C>>,
        second: &Arc<IntersectionNode<C>>,
        equivalences: &ColumnEquivalences,
        seen: &mut HashSet<String>,
        out: &mut Vec<Arc<IntersectionNode<C>>>,
    ) {
        let cols_first = first.ordering_columns();
        let cols_second = second.ordering_columns();
        let mut count = 0;
        while count < cols_first.len()
            && count < cols_second.len()
            && equivalences.are_equivalent(cols_first[count], cols_second[count])
        {
            count += 1;
        }
        if count == 0 {
            return;
        }
        let comparison = &cols_first[..count];
        let t_first = first.leaf_table();
        let t_second = second.leaf_table();

        if t_first == t_second
            || self.schema.is_ancestor(t_first, t_second)
            || self.schema.is_ancestor(t_second, t_first)
        {
            // Single branch: the descendant absorbs the ancestor's
            // positional columns, so its full hkey must be covered and
            // only the deeper-first orientation is legal. A same-table
            // pair has no deeper side; a canonical orientation makes the
            // reversed pairing collapse onto the same node.
            let (deeper, shallower, deeper_table) = if t_first == t_second {
                let mut sig_first = String::new();
                first.write_signature(&mut sig_first);
                let mut sig_second = String::new();
                second.write_signature(&mut sig_second);
                if sig_first <= sig_second {
                    (first, second, t_first)
                } else {
                    (second, first, t_first)
                }
            } else if self.schema.is_ancestor(t_first, t_second) {
                (second, first, t_second)
            } else {
                (first, second, t_first)
            };
            if self.covers_hkey(deeper_table, comparison, equivalences) {
                push_unseen(
                    IntersectionNode::intersect(Arc::clone(deeper), Arc::clone(shallower), count),
                    seen,
                    out,
                );
            }
        } else if let Some(ancestor) = self.schema.common_ancestor(t_first, t_second) {
            // Different branches under a common ancestor: either side
            // may drive the merge.
            if self.covers_hkey(ancestor, comparison, equivalences) {
                push_unseen(
                    IntersectionNode::intersect(Arc::clone(first), Arc::clone(second), count),
                    seen,
                    out,
                );
                push_unseen(
                    IntersectionNode::intersect(Arc::clone(second), Arc::clone(first), count),
                    seen,
                    out,
                );
            }
        }
        // Different groups: the pair is pruned, not an error.
    }

    fn covers_hkey(
        &self,
        table: TableId,
        comparison: &[ColumnRef],
        equivalences: &ColumnEquivalences,
    ) -> bool {
        let Ok(table) = self.schema.table(table) else {
            return false;
        };
        table
            .hkey()
            .columns()
            .iter()
            .all(|&hkey_column| equivalences.contains_equivalent(comparison, hkey_column))
    }
}

fn take_covered<C>(residual: &mut [bool], node: &IntersectionNode<C>) -> Vec<usize> {
    let mut ids = Vec::new();
    node.condition_ids(&mut ids);
    let mut removed = Vec::new();
    for id in ids {
        if residual[id] {
            residual[id] = false;
            removed.push(id);
        }
    }
    removed
}

fn restore(residual: &mut [bool], removed: &[usize]) {
    for &id in removed {
        residual[id] = true;
    }
}

fn push_unseen<C>(
    node: IntersectionNode<C>,
    seen: &mut HashSet<String>,
    out: &mut Vec<Arc<IntersectionNode<C>>>,
) {
    let mut signature = String::new();
    node.write_signature(&mut signature);
    if seen.insert(signature) {
        out.push(Arc::new(node));
    }
}
