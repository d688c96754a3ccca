use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind reserved for blank nodes minted by the engine.
pub const BLANK_KIND: &str = "/_";

/// A typed graph node, written `/kind<id>`.
///
/// The kind is a path-like string (`/u`, `/item/book`); the id is free text
/// without angle brackets or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Node {
    kind: String,
    id: String,
}

impl Node {
    pub fn new(kind: &str, id: &str) -> Result<Self, ParseError> {
        validate_kind(kind)?;
        validate_id(id)?;
        Ok(Self {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }

    /// Mints a fresh blank node with a UUID id.
    pub fn new_blank() -> Self {
        Self {
            kind: BLANK_KIND.to_string(),
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_blank(&self) -> bool {
        self.kind == BLANK_KIND
    }
}

fn validate_kind(kind: &str) -> Result<(), ParseError> {
    let ok = kind.starts_with('/')
        && kind.len() > 1
        && !kind.contains(['<', '>'])
        && !kind.contains(char::is_whitespace)
        && !kind.ends_with('/');
    if ok {
        Ok(())
    } else {
        Err(ParseError::Node(format!("bad node kind {kind:?}")))
    }
}

fn validate_id(id: &str) -> Result<(), ParseError> {
    let ok = !id.is_empty() && !id.contains(['<', '>']) && !id.contains(char::is_whitespace);
    if ok {
        Ok(())
    } else {
        Err(ParseError::Node(format!("bad node id {id:?}")))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.kind, self.id)
    }
}

impl FromStr for Node {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let open = s
            .find('<')
            .ok_or_else(|| ParseError::Node(s.to_string()))?;
        if !s.ends_with('>') {
            return Err(ParseError::Node(s.to_string()));
        }
        Node::new(&s[..open], &s[open + 1..s.len() - 1])
    }
}
