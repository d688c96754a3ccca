//! Shared fixtures for the engine integration tests.

use chronograph_query::{
    GraphClause, Projection, Result, Statement, StatementKind, Table, new_plan,
};
use chronograph_storage::MemoryStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(
    store: &Arc<MemoryStore>,
    ctx: &CancellationToken,
    stmt: &Statement,
) -> Result<Table> {
    let plan = new_plan(ctx, Arc::clone(store), stmt, 0, None).await?;
    plan.execute(ctx).await
}

/// Creates `graph` and inserts the given triple lines.
pub async fn setup(graph: &str, triples: &[&str]) -> (Arc<MemoryStore>, CancellationToken) {
    let store = Arc::new(MemoryStore::new());
    let ctx = CancellationToken::new();

    let mut create = Statement::new();
    create.bind_type(StatementKind::Create);
    create.add_graph(graph);
    run(&store, &ctx, &create).await.unwrap();

    if !triples.is_empty() {
        let mut insert = Statement::new();
        insert.bind_type(StatementKind::Insert);
        insert.add_graph(graph);
        for line in triples {
            insert.add_data(line.parse().unwrap());
        }
        run(&store, &ctx, &insert).await.unwrap();
    }
    (store, ctx)
}

/// Appends a finished pattern clause to the statement.
pub fn add_clause(stmt: &mut Statement, build: impl FnOnce(&mut GraphClause)) {
    stmt.reset_working_graph_clause();
    build(stmt.working_graph_clause().unwrap());
    stmt.add_working_graph_clause();
}

/// Appends a projection of `binding`.
pub fn project(stmt: &mut Statement, binding: &str) {
    add_projection(stmt, |p| p.binding = Some(binding.to_string()));
}

pub fn add_projection(stmt: &mut Statement, build: impl FnOnce(&mut Projection)) {
    stmt.reset_working_projection();
    build(stmt.working_projection().unwrap());
    stmt.add_working_projection();
}

/// A query statement over one graph, with clauses and projections applied.
pub fn query(graph: &str) -> Statement {
    let mut stmt = Statement::new();
    stmt.bind_type(StatementKind::Query);
    stmt.add_graph(graph);
    stmt
}
