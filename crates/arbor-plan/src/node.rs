//! Intersection plan nodes.

use std::fmt::Write as _;
use std::sync::Arc;

use arbor_common::types::{ColumnRef, TableId};

use crate::candidate::MultiIndexCandidate;

/// A planner output node: a single-index scan, or a merge-intersection
/// of two nodes aligned on leading comparison columns.
///
/// Nodes form an immutable tree. The optimizer turns them into scan
/// requests; the comparison-column count says how many leading ordering
/// columns align the two streams during the merge.
#[derive(Debug, Clone)]
pub enum IntersectionNode<C> {
    /// A single-index scan from one candidate.
    Leaf(MultiIndexCandidate<C>),
    /// A merge-intersection of two nodes.
    Intersection(Intersection<C>),
}

/// The interior form of [`IntersectionNode`].
///
/// The outer stream drives the merge; for single-branch intersections it
/// is always the deeper side.
#[derive(Debug, Clone)]
pub struct Intersection<C> {
    outer: Arc<IntersectionNode<C>>,
    inner: Arc<IntersectionNode<C>>,
    comparison_columns: usize,
}

impl<C> Intersection<C> {
    /// Returns the outer (driving) stream.
    #[must_use]
    pub fn outer(&self) -> &Arc<IntersectionNode<C>> {
        &self.outer
    }

    /// Returns the inner stream.
    #[must_use]
    pub fn inner(&self) -> &Arc<IntersectionNode<C>> {
        &self.inner
    }

    /// Returns how many leading ordering columns align the two streams.
    #[must_use]
    pub const fn comparison_columns(&self) -> usize {
        self.comparison_columns
    }
}

impl<C> IntersectionNode<C> {
    pub(crate) fn intersect(
        outer: Arc<IntersectionNode<C>>,
        inner: Arc<IntersectionNode<C>>,
        comparison_columns: usize,
    ) -> Self {
        Self::Intersection(Intersection {
            outer,
            inner,
            comparison_columns,
        })
    }

    /// Returns the deepest table whose rows the node's stream yields.
    #[must_use]
    pub fn leaf_table(&self) -> TableId {
        match self {
            Self::Leaf(candidate) => candidate.index().table(),
            Self::Intersection(intersection) => intersection.outer.leaf_table(),
        }
    }

    /// Returns the columns the node's stream is ordered by after its
    /// pegged equality prefix.
    ///
    /// A merge-intersection yields rows ordered by the columns it was
    /// aligned on, so an interior node's ordering is the aligned prefix
    /// of its outer stream.
    #[must_use]
    pub fn ordering_columns(&self) -> &[ColumnRef] {
        match self {
            Self::Leaf(candidate) => candidate.ordering_columns(),
            Self::Intersection(intersection) => {
                &intersection.outer.ordering_columns()[..intersection.comparison_columns]
            }
        }
    }

    /// Collects the ids of the conditions the node covers.
    pub(crate) fn condition_ids(&self, out: &mut Vec<usize>) {
        match self {
            Self::Leaf(candidate) => {
                for pegged in candidate.pegged() {
                    if !out.contains(&pegged.id) {
                        out.push(pegged.id);
                    }
                }
            }
            Self::Intersection(intersection) => {
                intersection.outer.condition_ids(out);
                intersection.inner.condition_ids(out);
            }
        }
    }

    /// Returns the conditions the node covers, outer side first.
    #[must_use]
    pub fn conditions(&self) -> Vec<&C> {
        match self {
            Self::Leaf(candidate) => candidate.pegged().iter().map(|p| p.condition()).collect(),
            Self::Intersection(intersection) => {
                let mut out = intersection.outer.conditions();
                out.extend(intersection.inner.conditions());
                out
            }
        }
    }

    /// Appends a structural signature, used to recognize a node already
    /// synthesized through a different pairing order.
    pub(crate) fn write_signature(&self, out: &mut String) {
        match self {
            Self::Leaf(candidate) => {
                let _ = write!(out, "L{}", candidate.index().id());
            }
            Self::Intersection(intersection) => {
                let _ = write!(out, "I{}(", intersection.comparison_columns);
                intersection.outer.write_signature(out);
                out.push(',');
                intersection.inner.write_signature(out);
                out.push(')');
            }
        }
    }
}
