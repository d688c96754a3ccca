//! # Chronograph
//!
//! **An embedded temporal triple store.**
//!
//! Chronograph stores RDF-style triples whose predicates may carry a time
//! anchor, organizes them into named graphs, and executes BQL statements
//! (a SPARQL-like language) against them. The BQL grammar lives in an
//! external parse driver; this crate is everything behind it: the semantic
//! statement IR, the planner, the executor, and a volatile in-memory
//! backend.
//!
//! ## Quickstart
//!
//! ```ignore
//! use chronograph::{Db, Statement, StatementKind};
//! use tokio_util::sync::CancellationToken;
//!
//! let db = Db::new();
//! let ctx = CancellationToken::new();
//!
//! let mut create = Statement::new();
//! create.bind_type(StatementKind::Create);
//! create.add_graph("?family");
//! db.execute(&ctx, &create).await?;
//!
//! let mut insert = Statement::new();
//! insert.bind_type(StatementKind::Insert);
//! insert.add_graph("?family");
//! insert.add_data("/u<joe> \"parent_of\"@[] /u<mary>".parse()?);
//! db.execute(&ctx, &insert).await?;
//! ```
//!
//! ## Core Concepts
//!
//! - **[`Db`]**: The entry point. Owns the store; safe to share across
//!   tasks (handles are cheap clones).
//! - **[`Statement`]**: The mutable semantic IR a parse driver populates,
//!   sealed before execution.
//! - **[`Table`]**: The relational result of a statement: ordered columns
//!   of typed cells.
//! - Every call takes a `CancellationToken`; cancellation surfaces as
//!   [`Error::Canceled`].

mod error;

use chronograph_query::planner::Tracer;
use chronograph_storage::MemoryStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use chronograph_api::{
    Graph, Literal, Lookup, Node, Object, Predicate, Store, Triple, format_anchor, parse_anchor,
};
pub use chronograph_query as query;
pub use chronograph_query::{
    Aggregator, Cell, Direction, Expr, Operand, Row, Statement, StatementKind, Table,
};
pub use error::{Error, Result};

/// The main database handle: an in-memory store plus the BQL execution
/// engine.
///
/// # Concurrency
///
/// `Db` is `Clone` and can be shared across tasks. Queries take shared
/// access to the graphs they read; mutations take exclusive access per
/// graph.
#[derive(Debug, Clone, Default)]
pub struct Db {
    store: Arc<MemoryStore>,
}

impl Db {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying store, for callers that want to reach the storage
    /// contract directly.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Plans and executes a sealed statement. Mutation statements return an
    /// empty table.
    pub async fn execute(&self, ctx: &CancellationToken, stmt: &Statement) -> Result<Table> {
        self.execute_with(ctx, stmt, 0, None).await
    }

    /// [`execute`](Db::execute) with an explicit join chunk size and an
    /// optional plan tracer.
    pub async fn execute_with(
        &self,
        ctx: &CancellationToken,
        stmt: &Statement,
        chunk_size: usize,
        tracer: Option<Tracer>,
    ) -> Result<Table> {
        let plan =
            chronograph_query::new_plan(ctx, Arc::clone(&self.store), stmt, chunk_size, tracer)
                .await?;
        Ok(plan.execute(ctx).await?)
    }
}
