//! Semantic and storage validation at plan construction.

mod common;

use common::{add_clause, add_projection, project, query, run, setup};
use chronograph_api::StorageError;
use chronograph_query::{Direction, Error, Statement, StatementKind};

const TRIPLE: &str = "/u<joe> \"parent_of\"@[] /u<mary>";

#[tokio::test]
async fn statement_without_a_type_fails() {
    let (store, ctx) = setup("?a", &[]).await;
    let stmt = Statement::new();
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn query_without_projections_fails() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?a");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
    });
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn projection_of_an_unbound_name_fails() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?a");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
    });
    project(&mut stmt, "?nope");
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn duplicate_output_names_fail() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?a");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
        c.o_binding = Some("?o".to_string());
    });
    project(&mut stmt, "?s");
    add_projection(&mut stmt, |p| {
        p.binding = Some("?o".to_string());
        p.alias = Some("?s".to_string());
    });
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn unknown_source_graph_fails() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?missing");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
    });
    project(&mut stmt, "?s");
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Storage(StorageError::GraphNotFound(_)))
    ));
}

#[tokio::test]
async fn group_by_on_an_unprojected_binding_fails() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?a");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
        c.o_binding = Some("?o".to_string());
    });
    project(&mut stmt, "?s");
    stmt.add_group_by("?o");
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn order_by_on_an_unknown_name_fails() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?a");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
    });
    project(&mut stmt, "?s");
    stmt.add_order_by("?nope", Direction::Ascending);
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn having_over_an_unbound_name_fails() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?a");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
    });
    project(&mut stmt, "?s");
    stmt.set_having(chronograph_query::Expr::eq(
        chronograph_query::Operand::Binding("?nope".to_string()),
        chronograph_query::Operand::Binding("?s".to_string()),
    ));
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn insert_without_data_fails() {
    let (store, ctx) = setup("?a", &[]).await;
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Insert);
    stmt.add_graph("?a");
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn create_of_an_existing_graph_fails() {
    let (store, ctx) = setup("?a", &[]).await;
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Create);
    stmt.add_graph("?a");
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Storage(StorageError::GraphExists(_)))
    ));
}

#[tokio::test]
async fn drop_of_a_missing_graph_fails() {
    let (store, ctx) = setup("?a", &[]).await;
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Drop);
    stmt.add_graph("?missing");
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Storage(StorageError::GraphNotFound(_)))
    ));
}

#[tokio::test]
async fn construct_with_unbound_input_fails() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Construct);
    stmt.add_graph("?a");
    stmt.add_output_graph("?a");
    stmt.reset_working_graph_clause();
    stmt.working_graph_clause().unwrap().s_binding = Some("?s".to_string());
    stmt.add_working_graph_clause();
    stmt.reset_working_construct_clause();
    {
        let cc = stmt.working_construct_clause().unwrap();
        cc.s_binding = Some("?other".to_string());
        cc.p = Some("\"p\"@[]".parse().unwrap());
        cc.o = Some("/u<x>".parse().unwrap());
    }
    stmt.add_working_construct_clause();
    assert!(matches!(
        run(&store, &ctx, &stmt).await,
        Err(Error::Semantic(_))
    ));
}

#[tokio::test]
async fn duplicate_graph_names_are_deduplicated() {
    let (store, ctx) = setup("?a", &[TRIPLE]).await;
    let mut stmt = query("?a");
    stmt.add_graph("?a");
    add_clause(&mut stmt, |c| {
        c.s_binding = Some("?s".to_string());
    });
    project(&mut stmt, "?s");
    let tbl = run(&store, &ctx, &stmt).await.unwrap();
    // One graph consulted once: a single row, not two.
    assert_eq!(tbl.len(), 1);
}
