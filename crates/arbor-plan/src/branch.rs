//! Branch input contract.

use arbor_common::types::ColumnRef;
use arbor_schema::IndexDef;

/// Caller-supplied bundle describing one hierarchy branch of a query:
/// the residual conditions live on it, the indexes available on it, and
/// the column each condition constrains.
///
/// Conditions are opaque to the planner; the only operation it needs is
/// [`BranchInfo::column_of`]. A condition that maps to no column is
/// unusable for index pegging and is skipped with a logged warning,
/// never an error.
pub trait BranchInfo {
    /// The caller's residual-predicate type.
    type Condition: Clone;

    /// Returns the branch's conditions in evaluation order.
    fn conditions(&self) -> &[Self::Condition];

    /// Returns the column a condition constrains, if any.
    fn column_of(&self, condition: &Self::Condition) -> Option<ColumnRef>;

    /// Returns the indexes available on the branch.
    fn indexes(&self) -> &[IndexDef];
}
