//! Chronograph Query Engine
//!
//! Plans and executes BQL statements over the `chronograph-api` storage
//! contract.
//!
//! # Quick Start
//!
//! ```ignore
//! use chronograph_query::{Statement, StatementKind, new_plan};
//!
//! let mut stmt = Statement::new();
//! stmt.bind_type(StatementKind::Query);
//! stmt.add_graph("?family");
//! // ... populated clause by clause by the parse driver ...
//! let plan = new_plan(&ctx, store, &stmt, 0, None).await?;
//! let table = plan.execute(&ctx).await?;
//! ```
//!
//! # Architecture
//!
//! - `semantic::Statement` - The mutable IR the parse driver populates
//! - `planner::new_plan` - Validates the statement and builds a [`Plan`]
//! - `executor` - Streams clause lookups and joins them into a [`Table`]
//! - `table` / `expression` - The relational result carrier and HAVING trees

pub mod error;
pub mod executor;
pub mod expression;
pub mod planner;
pub mod semantic;
pub mod table;

pub use error::{Error, Result};
pub use expression::{Comparator, Expr, Operand};
pub use planner::{Plan, Tracer, new_plan};
pub use semantic::{
    Aggregator, ConstructClause, Direction, GraphClause, OrderKey, Projection,
    ReificationClause, Statement, StatementKind,
};
pub use table::{Cell, Row, Table};
