//! End-to-end join-relationship scenarios (S1's relationship half, S3,
//! S4) plus universal invariant 6 (AND-conjunct order insensitivity).

use std::collections::HashSet;

use lineage_core::{ColumnRef, JoinExtractor, JoinType};

fn relationships(sql: &str) -> HashSet<(ColumnRef, ColumnRef, JoinType)> {
    JoinExtractor::new()
        .extract(sql)
        .unwrap()
        .into_values()
        .map(|r| (r.source, r.target, r.join_type))
        .collect()
}

#[test]
fn s1_cte_join_emits_relationship_with_opaque_side() {
    // The component itself stays pure: it emits the relationship even
    // though `a`'s schema is empty (a CTE alias). Filtering opaque-sided
    // relationships out is left to the consumer (spec's filter stage).
    let rels = relationships(
        "WITH a AS (SELECT * FROM public.t1), \
              b AS (SELECT * FROM a JOIN public.t2 ON a.id=public.t2.id) \
         SELECT * FROM b;",
    );

    assert_eq!(rels.len(), 1);
    let (source, target, join_type) = rels.into_iter().next().unwrap();
    assert_eq!(join_type, JoinType::Inner);
    assert_eq!(source, ColumnRef::new("", "a", "id"));
    assert_eq!(target, ColumnRef::new("public", "t2", "id"));
}

#[test]
fn s3_multi_join_yields_three_relationships() {
    let rels = relationships(
        "SELECT * FROM demo.a JOIN demo.b ON a.id=b.aid AND a.name=b.name \
                              JOIN demo.c ON a.id=c.aid;",
    );

    assert_eq!(rels.len(), 3);
    assert!(rels.contains(&(
        ColumnRef::new("demo", "a", "id"),
        ColumnRef::new("demo", "b", "aid"),
        JoinType::Inner
    )));
    assert!(rels.contains(&(
        ColumnRef::new("demo", "a", "name"),
        ColumnRef::new("demo", "b", "name"),
        JoinType::Inner
    )));
    assert!(rels.contains(&(
        ColumnRef::new("demo", "a", "id"),
        ColumnRef::new("demo", "c", "aid"),
        JoinType::Inner
    )));
}

#[test]
fn s4_in_subquery_yields_semi_relationship() {
    let rels = relationships("SELECT * FROM demo.t1 WHERE t1.cid IN (SELECT cid FROM demo.t2);");

    assert_eq!(rels.len(), 1);
    let (source, target, join_type) = rels.into_iter().next().unwrap();
    assert_eq!(join_type, JoinType::Semi);
    assert_eq!(source, ColumnRef::new("demo", "t1", "cid"));
    assert_eq!(target, ColumnRef::new("demo", "t2", "cid"));
}

#[test]
fn invariant_6_conjunct_order_does_not_change_relationship_set() {
    let forward = relationships(
        "SELECT * FROM demo.a JOIN demo.b ON a.id=b.aid AND a.name=b.name;",
    );
    let reversed = relationships(
        "SELECT * FROM demo.a JOIN demo.b ON a.name=b.name AND a.id=b.aid;",
    );

    assert_eq!(forward, reversed);
}

#[test]
fn no_tables_mentioned_yields_empty_relationship_set() {
    let rels = relationships("SELECT 1;");
    assert!(rels.is_empty());
}
