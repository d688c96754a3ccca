//! Resolving statements-about-triples through the `_subject` /
//! `_predicate` / `_object` vocabulary.

mod common;

use common::{add_clause, project, query, run, setup};
use chronograph_query::Cell;

// Two facts about joe and mary, each reified by its own statement node.
const REIFIED: [&str; 8] = [
    "/u<joe> \"parent_of\"@[] /u<mary>",
    "/u<joe> \"works_with\"@[] /u<mary>",
    "/_<s1> \"_subject\"@[] /u<joe>",
    "/_<s1> \"_predicate\"@[] \"parent_of\"@[]",
    "/_<s1> \"_object\"@[] /u<mary>",
    "/_<s2> \"_subject\"@[] /u<joe>",
    "/_<s2> \"_predicate\"@[] \"works_with\"@[]",
    "/_<s2> \"_object\"@[] /u<mary>",
];

#[tokio::test]
async fn statement_node_is_resolved_by_subject_object_and_predicate() {
    let (store, ctx) = setup("?test", &REIFIED).await;
    // {?stmt "_subject"@[] /u<joe> . ?stmt "_object"@[] /u<mary> .
    //  ?stmt "_predicate"@[] "parent_of"@[] as ?pred}
    let mut stmt = query("?test");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?stmt".to_string());
        c.p = Some("\"_subject\"@[]".parse().unwrap());
        c.o = Some("/u<joe>".parse().unwrap());
    });
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?stmt".to_string());
        c.p = Some("\"_object\"@[]".parse().unwrap());
        c.o = Some("/u<mary>".parse().unwrap());
    });
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?stmt".to_string());
        c.p = Some("\"_predicate\"@[]".parse().unwrap());
        c.o = Some("\"parent_of\"@[]".parse().unwrap());
        c.o_alias = Some("?pred".to_string());
    });
    project(&mut stmt, "?stmt");
    project(&mut stmt, "?pred");

    let tbl = run(&store, &ctx, &stmt).await.unwrap();
    assert_eq!(tbl.bindings(), &["?stmt", "?pred"]);
    assert_eq!(tbl.len(), 1);
    let row = &tbl.rows()[0];
    assert!(matches!(row.get("?stmt"), Some(Cell::Node(n)) if n.id() == "s1" && n.is_blank()));
    assert!(matches!(row.get("?pred"), Some(Cell::Predicate(p)) if p.id() == "parent_of"));
}

#[tokio::test]
async fn both_statement_nodes_match_without_the_predicate_constraint() {
    let (store, ctx) = setup("?test", &REIFIED).await;
    let mut stmt = query("?test");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?stmt".to_string());
        c.p = Some("\"_subject\"@[]".parse().unwrap());
        c.o = Some("/u<joe>".parse().unwrap());
    });
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?stmt".to_string());
        c.p = Some("\"_object\"@[]".parse().unwrap());
        c.o = Some("/u<mary>".parse().unwrap());
    });
    project(&mut stmt, "?stmt");
    let tbl = run(&store, &ctx, &stmt).await.unwrap();
    assert_eq!(tbl.len(), 2);
}
