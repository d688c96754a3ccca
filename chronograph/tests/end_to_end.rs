//! End-to-end statement execution through the `Db` facade.

use chronograph::query::Tracer;
use chronograph::{Cell, Db, Error, Statement, StatementKind};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

fn create(graph: &str) -> Statement {
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Create);
    stmt.add_graph(graph);
    stmt
}

fn insert(graph: &str, lines: &[&str]) -> Statement {
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Insert);
    stmt.add_graph(graph);
    for line in lines {
        stmt.add_data(line.parse().unwrap());
    }
    stmt
}

fn scan(graph: &str) -> Statement {
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Query);
    stmt.add_graph(graph);
    stmt.reset_working_graph_clause();
    {
        let c = stmt.working_graph_clause().unwrap();
        c.s_binding = Some("?s".to_string());
        c.p_binding = Some("?p".to_string());
        c.o_binding = Some("?o".to_string());
    }
    stmt.add_working_graph_clause();
    for b in ["?s", "?p", "?o"] {
        stmt.reset_working_projection();
        stmt.working_projection().unwrap().binding = Some(b.to_string());
        stmt.add_working_projection();
    }
    stmt
}

const FAMILY: [&str; 3] = [
    "/u<joe> \"parent_of\"@[] /u<mary>",
    "/u<joe> \"parent_of\"@[] /u<peter>",
    "/u<peter> \"parent_of\"@[] /u<john>",
];

#[tokio::test]
async fn create_insert_query_drop() {
    let db = Db::new();
    let ctx = CancellationToken::new();

    db.execute(&ctx, &create("?family")).await.unwrap();
    db.execute(&ctx, &insert("?family", &FAMILY)).await.unwrap();

    let tbl = db.execute(&ctx, &scan("?family")).await.unwrap();
    assert_eq!(tbl.len(), 3);

    let mut drop_stmt = Statement::new();
    drop_stmt.bind_type(StatementKind::Drop);
    drop_stmt.add_graph("?family");
    db.execute(&ctx, &drop_stmt).await.unwrap();

    let err = db.execute(&ctx, &scan("?family")).await;
    assert!(matches!(err, Err(Error::Storage(_))));
}

#[tokio::test]
async fn show_lists_graph_names() {
    let db = Db::new();
    let ctx = CancellationToken::new();
    db.execute(&ctx, &create("?a")).await.unwrap();
    db.execute(&ctx, &create("?b")).await.unwrap();

    let mut show = Statement::new();
    show.bind_type(StatementKind::Show);
    let tbl = db.execute(&ctx, &show).await.unwrap();
    assert_eq!(tbl.bindings(), &["?graph"]);
    let names: Vec<String> = tbl
        .rows()
        .iter()
        .map(|r| match r.get("?graph") {
            Some(Cell::Str(name)) => name.clone(),
            other => panic!("unexpected cell {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["?a", "?b"]);
}

#[tokio::test]
async fn chunked_execution_matches_unchunked() {
    let db = Db::new();
    let ctx = CancellationToken::new();
    db.execute(&ctx, &create("?family")).await.unwrap();
    db.execute(&ctx, &insert("?family", &FAMILY)).await.unwrap();

    let whole = db.execute(&ctx, &scan("?family")).await.unwrap();
    let chunked = db
        .execute_with(&ctx, &scan("?family"), 1, None)
        .await
        .unwrap();
    assert_eq!(whole.len(), chunked.len());
    assert_eq!(whole.bindings(), chunked.bindings());
}

#[tokio::test]
async fn cancellation_surfaces_as_canceled() {
    let db = Db::new();
    let ctx = CancellationToken::new();
    db.execute(&ctx, &create("?family")).await.unwrap();
    ctx.cancel();
    let err = db.execute(&ctx, &scan("?family")).await;
    assert!(matches!(err, Err(Error::Canceled)));
}

#[tokio::test]
async fn tracer_receives_plan_steps() {
    let db = Db::new();
    let ctx = CancellationToken::new();
    db.execute(&ctx, &create("?family")).await.unwrap();
    db.execute(&ctx, &insert("?family", &FAMILY)).await.unwrap();

    let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
    let tracer: Tracer = buf.clone();
    let tbl = db
        .execute_with(&ctx, &scan("?family"), 0, Some(tracer))
        .await
        .unwrap();
    assert_eq!(tbl.len(), 3);

    let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    assert!(text.contains("[plan]"), "missing plan steps: {text:?}");
    assert!(text.contains("[exec]"), "missing exec steps: {text:?}");
}
