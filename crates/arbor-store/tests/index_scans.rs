//! Index-driven scans: mapping entries back to group rows, covering
//! fast paths, group indexes with ancestor columns, and index
//! delete/rebuild.

use arbor_common::config::StoreConfig;
use arbor_common::types::{ColumnRef, IndexId, TableId};
use arbor_schema::{ColumnType, SchemaBuilder};
use arbor_store::row::{Field, RowData};
use arbor_store::{ColumnBitmap, GroupStore, RowCollector, ScanFlags, ScanRequest, Session};

struct Fixture {
    store: GroupStore,
    session: Session,
    root: TableId,
    mid: TableId,
    leaf: TableId,
    by_score: IndexId,
    by_root_name: IndexId,
}

/// root(rid, name) -> mid(mid_id, rid, score) -> leaf(leaf_id, mid_id),
/// with a secondary index on mid.score and a group index on
/// (root.name, mid.score). 10 roots, 10 mids per root, 10 leaves per
/// mid; score is mid_id modulo 7.
fn fixture() -> Fixture {
    let mut builder = SchemaBuilder::new();
    let root = builder
        .add_table(
            "root",
            None,
            &[("rid", ColumnType::Int), ("name", ColumnType::Text)],
            &[0],
            &[],
        )
        .unwrap();
    let mid = builder
        .add_table(
            "mid",
            Some(root),
            &[
                ("mid_id", ColumnType::Int),
                ("rid", ColumnType::Int),
                ("score", ColumnType::Int),
            ],
            &[0],
            &[1],
        )
        .unwrap();
    let leaf = builder
        .add_table(
            "leaf",
            Some(mid),
            &[("leaf_id", ColumnType::Int), ("mid_id", ColumnType::Int)],
            &[0],
            &[1],
        )
        .unwrap();
    let by_score = builder.add_index(mid, "by_score", &[2], false).unwrap();
    let by_root_name = builder
        .add_group_index(
            mid,
            "by_root_name",
            vec![ColumnRef::new(root, 1), ColumnRef::new(mid, 2)],
            false,
        )
        .unwrap();
    let store = GroupStore::new(&StoreConfig::for_testing(), builder.finish().unwrap()).unwrap();
    store.start();
    let session = Session::new();

    for r in 0..10i64 {
        let mut row = RowData::new(root, 2);
        row.set_field(0, r);
        row.set_field(1, format!("root-{r}"));
        store.write_row(&session, &row).unwrap();
        for m in 0..10i64 {
            let mid_id = r * 10 + m;
            let mut row = RowData::new(mid, 3);
            row.set_field(0, mid_id);
            row.set_field(1, r);
            row.set_field(2, mid_id % 7);
            store.write_row(&session, &row).unwrap();
            for l in 0..10i64 {
                let mut row = RowData::new(leaf, 2);
                row.set_field(0, mid_id * 10 + l);
                row.set_field(1, mid_id);
                store.write_row(&session, &row).unwrap();
            }
        }
    }

    Fixture {
        store,
        session,
        root,
        mid,
        leaf,
        by_score,
        by_root_name,
    }
}

fn collect_all(collector: &mut RowCollector) -> Vec<RowData> {
    let mut rows = Vec::new();
    while let Some(row) = collector.next_row().unwrap() {
        rows.push(row);
    }
    rows
}

fn int_field(row: &RowData, position: u16) -> i64 {
    match row.field(position) {
        Some(Field::Int(v)) => *v,
        other => panic!("expected an int at position {position}, got {other:?}"),
    }
}

fn score_bound(mid: TableId, score: i64) -> RowData {
    let mut bound = RowData::new(mid, 3);
    bound.set_field(0, score);
    bound
}

/// The mid ids whose score equals `score`, ascending.
fn mids_with_score(score: i64) -> Vec<i64> {
    (0..100).filter(|mid_id| mid_id % 7 == score).collect()
}

fn mid_only(fixture: &Fixture) -> ColumnBitmap {
    ColumnBitmap::for_tables(fixture.store.rowdefs(), fixture.root, &[fixture.mid]).unwrap()
}

fn equality_scan(fixture: &Fixture, index: IndexId, score: i64, projection: ColumnBitmap) -> Vec<RowData> {
    let request = ScanRequest::new(
        fixture.root,
        index,
        ScanFlags::empty(),
        Some(score_bound(fixture.mid, score)),
        Some(score_bound(fixture.mid, score)),
        projection,
    );
    let mut collector = fixture.store.open_scan(&fixture.session, request).unwrap();
    collect_all(&mut collector)
}

#[test]
fn test_equality_scan_matches_and_orders() {
    let fixture = fixture();
    let rows = equality_scan(&fixture, fixture.by_score, 3, mid_only(&fixture));
    let expected = mids_with_score(3);
    assert_eq!(rows.len(), expected.len());
    // Equal-score entries fall back to hierarchical-key order.
    let actual: Vec<i64> = rows.iter().map(|row| int_field(row, 0)).collect();
    assert_eq!(actual, expected);
    for row in &rows {
        assert_eq!(row.table(), fixture.mid);
        assert_eq!(int_field(row, 2), 3);
    }
}

#[test]
fn test_projected_ancestors_emitted_once_per_run() {
    let fixture = fixture();
    let projection = ColumnBitmap::for_tables(
        fixture.store.rowdefs(),
        fixture.root,
        &[fixture.root, fixture.mid],
    )
    .unwrap();
    let rows = equality_scan(&fixture, fixture.by_score, 3, projection);

    // Expected: per matched mid (hkey order), its root first, with a
    // root shared by the previous entry not re-emitted.
    let mut expected = Vec::new();
    let mut prev_root = None;
    for mid_id in mids_with_score(3) {
        let rid = mid_id / 10;
        if prev_root != Some(rid) {
            expected.push((fixture.root, rid));
            prev_root = Some(rid);
        }
        expected.push((fixture.mid, mid_id));
    }
    let actual: Vec<(TableId, i64)> = rows.iter().map(|row| (row.table(), int_field(row, 0))).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_descendants_follow_their_target() {
    let fixture = fixture();
    let projection = ColumnBitmap::for_tables(
        fixture.store.rowdefs(),
        fixture.root,
        &[fixture.mid, fixture.leaf],
    )
    .unwrap();
    let rows = equality_scan(&fixture, fixture.by_score, 3, projection);

    let matched = mids_with_score(3);
    assert_eq!(rows.len(), matched.len() * 11);
    // Each mid row is immediately followed by its ten leaves.
    for (i, &mid_id) in matched.iter().enumerate() {
        let chunk = &rows[i * 11..(i + 1) * 11];
        assert_eq!(chunk[0].table(), fixture.mid);
        assert_eq!(int_field(&chunk[0], 0), mid_id);
        for (l, row) in chunk[1..].iter().enumerate() {
            assert_eq!(row.table(), fixture.leaf);
            assert_eq!(int_field(row, 0), mid_id * 10 + l as i64);
        }
    }
}

#[test]
fn test_covering_scan_equals_dereferencing_scan() {
    let fixture = fixture();
    let flat_width = fixture.store.rowdefs().flat_width(fixture.root).unwrap();
    let mid_offset = fixture
        .store
        .rowdefs()
        .rowdef(fixture.mid)
        .unwrap()
        .flat_offset();

    // mid_id is a primary-key column and score is indexed: the index
    // entry alone satisfies the projection.
    let mut covering = ColumnBitmap::with_len(flat_width);
    covering.set(mid_offset); // mid_id
    covering.set(mid_offset + 2); // score
    let covered_rows = equality_scan(&fixture, fixture.by_score, 3, covering);

    // Adding rid (neither indexed nor a key column) forces the engine
    // back to the group tree.
    let mut dereferencing = ColumnBitmap::with_len(flat_width);
    dereferencing.set(mid_offset);
    dereferencing.set(mid_offset + 1); // rid
    dereferencing.set(mid_offset + 2);
    let dereferenced_rows = equality_scan(&fixture, fixture.by_score, 3, dereferencing);

    assert_eq!(covered_rows.len(), dereferenced_rows.len());
    for (covered, dereferenced) in covered_rows.iter().zip(&dereferenced_rows) {
        assert_eq!(covered.table(), dereferenced.table());
        assert_eq!(int_field(covered, 0), int_field(dereferenced, 0));
        assert_eq!(int_field(covered, 2), int_field(dereferenced, 2));
        // The covering row never materializes the unprojected field.
        assert!(covered.field(1).is_none());
        assert!(dereferenced.field(1).is_some());
    }
}

#[test]
fn test_index_scan_descending_reverses() {
    let fixture = fixture();
    let low = score_bound(fixture.mid, 2);
    let high = score_bound(fixture.mid, 4);

    let ascending = ScanRequest::new(
        fixture.root,
        fixture.by_score,
        ScanFlags::empty(),
        Some(low.clone()),
        Some(high.clone()),
        mid_only(&fixture),
    );
    let mut collector = fixture.store.open_scan(&fixture.session, ascending).unwrap();
    let forward = collect_all(&mut collector);
    assert!(!forward.is_empty());

    let descending = ScanRequest::new(
        fixture.root,
        fixture.by_score,
        ScanFlags::DESCENDING,
        Some(high),
        Some(low),
        mid_only(&fixture),
    );
    let mut collector = fixture.store.open_scan(&fixture.session, descending).unwrap();
    let backward = collect_all(&mut collector);

    let mut reversed = forward.clone();
    reversed.reverse();
    assert_eq!(backward, reversed);
}

#[test]
fn test_group_index_binds_ancestor_column() {
    let fixture = fixture();
    // Bind only the leading (root.name) column: a prefix bound matching
    // every mid under root 4, ordered by score then hkey.
    let mut bound = RowData::new(fixture.mid, 3);
    bound.set_field(0, "root-4");
    let request = ScanRequest::new(
        fixture.root,
        fixture.by_root_name,
        ScanFlags::empty(),
        Some(bound.clone()),
        Some(bound),
        mid_only(&fixture),
    );
    let mut collector = fixture.store.open_scan(&fixture.session, request).unwrap();
    let rows = collect_all(&mut collector);
    assert_eq!(rows.len(), 10);
    for row in &rows {
        assert_eq!(int_field(row, 1), 4);
    }
    let scores: Vec<i64> = rows.iter().map(|row| int_field(row, 2)).collect();
    let mut sorted = scores.clone();
    sorted.sort_unstable();
    assert_eq!(scores, sorted);
}

#[test]
fn test_delete_then_rebuild_indexes() {
    let fixture = fixture();
    let expected = mids_with_score(3).len();
    assert_eq!(
        equality_scan(&fixture, fixture.by_score, 3, mid_only(&fixture)).len(),
        expected
    );

    fixture.store.delete_indexes(&fixture.session).unwrap();
    assert_eq!(
        equality_scan(&fixture, fixture.by_score, 3, mid_only(&fixture)).len(),
        0
    );

    fixture.store.build_indexes(&fixture.session).unwrap();
    assert_eq!(
        equality_scan(&fixture, fixture.by_score, 3, mid_only(&fixture)).len(),
        expected
    );
}

#[test]
fn test_zero_descendant_rows_do_not_report_more() {
    let fixture = fixture();
    // A mid row with a unique score and no leaves under it.
    let mut lone_root = RowData::new(fixture.root, 2);
    lone_root.set_field(0, 99i64);
    lone_root.set_field(1, "root-99");
    fixture.store.write_row(&fixture.session, &lone_root).unwrap();
    let mut lone_mid = RowData::new(fixture.mid, 3);
    lone_mid.set_field(0, 990i64);
    lone_mid.set_field(1, 99i64);
    lone_mid.set_field(2, 999i64);
    fixture.store.write_row(&fixture.session, &lone_mid).unwrap();

    let projection = ColumnBitmap::for_tables(
        fixture.store.rowdefs(),
        fixture.root,
        &[fixture.mid, fixture.leaf],
    )
    .unwrap();
    let request = ScanRequest::new(
        fixture.root,
        fixture.by_score,
        ScanFlags::SINGLE_ROW | ScanFlags::END_AT_EDGE,
        Some(score_bound(fixture.mid, 999)),
        None,
        projection,
    );
    let mut collector = fixture.store.open_scan(&fixture.session, request).unwrap();
    assert!(collector.has_more());
    let row = collector.next_row().unwrap().unwrap();
    assert_eq!(int_field(&row, 0), 990);
    assert!(!collector.has_more());
    assert!(collector.next_row().unwrap().is_none());
}

#[test]
fn test_deferred_toggle_does_not_disturb_open_scan() {
    let fixture = fixture();
    let request = ScanRequest::new(
        fixture.root,
        fixture.by_score,
        ScanFlags::empty(),
        Some(score_bound(fixture.mid, 3)),
        Some(score_bound(fixture.mid, 3)),
        mid_only(&fixture),
    );
    let mut collector = fixture.store.open_scan(&fixture.session, request).unwrap();
    let first = collector.next_row().unwrap().unwrap();
    assert_eq!(int_field(&first, 0), 3);

    // Management calls may arrive at any time mid-scan.
    fixture.store.set_deferred_index_building(true);
    fixture.store.set_verbose_logging(true);
    let rest = collect_all(&mut collector);
    assert_eq!(rest.len(), mids_with_score(3).len() - 1);
    fixture.store.set_deferred_index_building(false);
    fixture.store.set_verbose_logging(false);
}
