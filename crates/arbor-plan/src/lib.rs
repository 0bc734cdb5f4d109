//! # arbor-plan
//!
//! The multi-index intersection planner for ArborDB.
//!
//! Given the residual conditions and available indexes of one or more
//! hierarchy branches, [`MultiIndexEnumerator`] enumerates every pair of
//! index streams whose merge-intersection is a legal, hierarchy-respecting
//! access path. Legality rests on the same physical fact the scan engine
//! exploits: index streams are ordered by the target row's hierarchical
//! key after their pegged equality prefix, so two streams may be aligned
//! exactly when their shared ordering columns cover the hierarchical key
//! of the relevant ancestor.
//!
//! Planning is a pure computation over caller-supplied immutable inputs;
//! ranking the returned combinations is the cost-based optimizer's job.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod branch;
mod candidate;
mod enumerator;
mod node;

pub use branch::BranchInfo;
pub use candidate::{MultiIndexCandidate, PeggedCondition};
pub use enumerator::MultiIndexEnumerator;
pub use node::{Intersection, IntersectionNode};
