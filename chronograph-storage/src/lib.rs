//! Chronograph storage layer.
//!
//! Provides the volatile in-memory backend behind the `chronograph-api`
//! storage traits: named graphs holding ordered triple sets with secondary
//! indexes per lookup path, streaming results through bounded channels.

mod memory;

pub use memory::{MemoryGraph, MemoryStore};
