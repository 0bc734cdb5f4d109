//! Index candidates.

use std::collections::HashMap;

use arbor_common::types::ColumnRef;
use arbor_schema::{HKey, IndexDef};

/// One pegged condition: an index column bound by exactly one condition.
#[derive(Debug, Clone)]
pub struct PeggedCondition<C> {
    column: ColumnRef,
    condition: C,
    pub(crate) id: usize,
}

impl<C> PeggedCondition<C> {
    /// Returns the bound index column.
    #[must_use]
    pub const fn column(&self) -> ColumnRef {
        self.column
    }

    /// Returns the binding condition.
    pub const fn condition(&self) -> &C {
        &self.condition
    }
}

/// An index paired with the maximal prefix of its columns bound by
/// available conditions.
///
/// Pegging is greedy from the index's leading edge inward and stops at
/// the first unbound or already-claimed column, so the pegged conditions
/// always form a contiguous leading prefix of the index's columns.
#[derive(Debug, Clone)]
pub struct MultiIndexCandidate<C> {
    index: IndexDef,
    pegged: Vec<PeggedCondition<C>>,
    ordering_columns: Vec<ColumnRef>,
}

impl<C: Clone> MultiIndexCandidate<C> {
    /// Builds a candidate for one index from a branch's column bindings.
    ///
    /// `hkey` is the index's target-table hierarchical key: an index
    /// entry is ordered by the declared columns and then by the hkey
    /// columns it does not already carry, and everything after the
    /// pegged equality prefix is what the candidate's stream is sorted
    /// by. That tail is cached here as the candidate's ordering columns.
    pub(crate) fn build(
        index: &IndexDef,
        bindings: &HashMap<ColumnRef, (C, usize)>,
        hkey: &HKey,
    ) -> Self {
        let mut pegged: Vec<PeggedCondition<C>> = Vec::new();
        for &column in index.columns() {
            let Some((condition, id)) = bindings.get(&column) else {
                break;
            };
            if pegged.iter().any(|p| p.id == *id) {
                break;
            }
            pegged.push(PeggedCondition {
                column,
                condition: condition.clone(),
                id: *id,
            });
        }
        let mut ordering_columns: Vec<ColumnRef> = index.columns()[pegged.len()..].to_vec();
        for &column in hkey.columns() {
            if !index.columns().contains(&column) {
                ordering_columns.push(column);
            }
        }
        Self {
            index: index.clone(),
            pegged,
            ordering_columns,
        }
    }
}

impl<C> MultiIndexCandidate<C> {
    /// Returns the candidate's index.
    #[must_use]
    pub const fn index(&self) -> &IndexDef {
        &self.index
    }

    /// Returns the pegged conditions, leading edge first.
    #[must_use]
    pub fn pegged(&self) -> &[PeggedCondition<C>] {
        &self.pegged
    }

    /// Returns the number of pegged conditions.
    #[must_use]
    pub fn num_pegged(&self) -> usize {
        self.pegged.len()
    }

    /// Returns the columns the candidate's stream is ordered by after
    /// its pegged equality prefix.
    #[must_use]
    pub fn ordering_columns(&self) -> &[ColumnRef] {
        &self.ordering_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::types::TableId;
    use arbor_schema::{ColumnType, Schema, SchemaBuilder};

    fn orders_schema() -> (Schema, TableId, TableId) {
        let mut builder = SchemaBuilder::new();
        let customer = builder
            .add_table("customer", None, &[("cid", ColumnType::Int)], &[0], &[])
            .unwrap();
        let order = builder
            .add_table(
                "order",
                Some(customer),
                &[
                    ("oid", ColumnType::Int),
                    ("cid", ColumnType::Int),
                    ("date", ColumnType::Int),
                    ("priority", ColumnType::Int),
                ],
                &[0],
                &[1],
            )
            .unwrap();
        builder
            .add_index(order, "by_date_priority", &[2, 3], false)
            .unwrap();
        (builder.finish().unwrap(), customer, order)
    }

    fn bindings(columns: &[ColumnRef]) -> HashMap<ColumnRef, (&'static str, usize)> {
        columns
            .iter()
            .enumerate()
            .map(|(id, &column)| (column, ("cond", id)))
            .collect()
    }

    #[test]
    fn test_pegging_is_contiguous_prefix() {
        let (schema, _, order) = orders_schema();
        let index = schema.index_by_name(order, "by_date_priority").unwrap();
        let hkey = schema.table(order).unwrap().hkey();

        // Both columns bound: both pegged.
        let both = bindings(&[ColumnRef::new(order, 2), ColumnRef::new(order, 3)]);
        let candidate = MultiIndexCandidate::build(index, &both, hkey);
        assert_eq!(candidate.num_pegged(), 2);
        assert_eq!(candidate.pegged()[0].column(), ColumnRef::new(order, 2));

        // Only the second column bound: the gap stops pegging at zero.
        let second_only = bindings(&[ColumnRef::new(order, 3)]);
        let candidate = MultiIndexCandidate::build(index, &second_only, hkey);
        assert_eq!(candidate.num_pegged(), 0);

        // Only the first column bound.
        let first_only = bindings(&[ColumnRef::new(order, 2)]);
        let candidate = MultiIndexCandidate::build(index, &first_only, hkey);
        assert_eq!(candidate.num_pegged(), 1);
    }

    #[test]
    fn test_ordering_columns_append_missing_hkey() {
        let (schema, customer, order) = orders_schema();
        let index = schema.index_by_name(order, "by_date_priority").unwrap();
        let hkey = schema.table(order).unwrap().hkey();

        let first_only = bindings(&[ColumnRef::new(order, 2)]);
        let candidate = MultiIndexCandidate::build(index, &first_only, hkey);
        // Unpegged declared tail, then the hkey columns the index does
        // not carry: [priority, customer.cid, order.oid].
        assert_eq!(
            candidate.ordering_columns(),
            &[
                ColumnRef::new(order, 3),
                ColumnRef::new(customer, 0),
                ColumnRef::new(order, 0),
            ]
        );
    }

    #[test]
    fn test_same_condition_claims_one_column() {
        let (schema, _, order) = orders_schema();
        let index = schema.index_by_name(order, "by_date_priority").unwrap();
        let hkey = schema.table(order).unwrap().hkey();

        // One condition bound to both columns: the second peg would
        // re-claim it, so pegging stops after the first.
        let mut shared = HashMap::new();
        shared.insert(ColumnRef::new(order, 2), ("cond", 0));
        shared.insert(ColumnRef::new(order, 3), ("cond", 0));
        let candidate = MultiIndexCandidate::build(index, &shared, hkey);
        assert_eq!(candidate.num_pegged(), 1);
    }
}
