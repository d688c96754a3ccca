//! Chronograph public API: the temporal triple data model and the abstract
//! storage contract backends implement.
//!
//! A [`Triple`] is `(subject, predicate, object)`. Subjects are typed
//! [`Node`]s; [`Predicate`]s are immutable (`"name"@[]`) or temporal
//! (`"name"@[2016-04-10T04:21:00.000000000Z]`); objects are nodes,
//! predicates, or typed [`Literal`]s. Triples live in named graphs behind
//! the [`Store`] / [`Graph`] traits, which stream lookups through bounded
//! channels under a caller-supplied cancellation token.

mod error;
mod literal;
mod node;
mod predicate;
mod storage;
mod triple;

pub use error::{ParseError, StorageError, StorageResult};
pub use literal::Literal;
pub use node::{BLANK_KIND, Node};
pub use predicate::{Predicate, format_anchor, parse_anchor};
pub use storage::{Graph, Lookup, Store};
pub use triple::{Object, REIFY_OBJECT, REIFY_PREDICATE, REIFY_SUBJECT, Triple};
