use crate::error::ParseError;
use crate::literal::Literal;
use crate::node::Node;
use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Predicate ids of the statement triples emitted by [`Triple::reify`].
pub const REIFY_SUBJECT: &str = "_subject";
pub const REIFY_PREDICATE: &str = "_predicate";
pub const REIFY_OBJECT: &str = "_object";

/// The object position of a triple: a node, a predicate (temporally anchored
/// objects are temporal predicates in object position), or a typed literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Object {
    Node(Node),
    Predicate(Predicate),
    Literal(Literal),
}

impl Object {
    pub fn node(&self) -> Option<&Node> {
        match self {
            Object::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            Object::Predicate(p) => Some(p),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match self {
            Object::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// The id portion of the object, when it has one: a node id or a
    /// predicate id. Literals have values, not ids.
    pub fn id(&self) -> Option<&str> {
        match self {
            Object::Node(n) => Some(n.id()),
            Object::Predicate(p) => Some(p.id()),
            Object::Literal(_) => None,
        }
    }

    /// The type portion of the object: a node kind or a literal type name.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Object::Node(n) => Some(n.kind()),
            Object::Predicate(_) => None,
            Object::Literal(l) => Some(l.type_name()),
        }
    }

    pub fn anchor(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        match self {
            Object::Predicate(p) => p.anchor(),
            _ => None,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Node(n) => n.fmt(f),
            Object::Predicate(p) => p.fmt(f),
            Object::Literal(l) => l.fmt(f),
        }
    }
}

impl FromStr for Object {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('/') {
            return s.parse().map(Object::Node);
        }
        if s.contains("\"@[") {
            return s.parse().map(Object::Predicate);
        }
        s.parse().map(Object::Literal)
    }
}

/// An RDF-style `(subject, predicate, object)` statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    s: Node,
    p: Predicate,
    o: Object,
}

impl Triple {
    pub fn new(s: Node, p: Predicate, o: Object) -> Self {
        Self { s, p, o }
    }

    pub fn subject(&self) -> &Node {
        &self.s
    }

    pub fn predicate(&self) -> &Predicate {
        &self.p
    }

    pub fn object(&self) -> &Object {
        &self.o
    }

    /// Reifies this triple: mints a blank node standing for it and returns
    /// the three statement triples (`_subject`, `_predicate`, `_object`)
    /// together with the blank node. The statement predicates inherit this
    /// triple's anchor, so statements about temporal facts stay temporal.
    pub fn reify(&self) -> (Vec<Triple>, Node) {
        let blank = Node::new_blank();
        let stmt = |id: &str| Predicate::from_parts(id.to_string(), self.p.anchor().copied());
        let statements = vec![
            Triple::new(blank.clone(), stmt(REIFY_SUBJECT), Object::Node(self.s.clone())),
            Triple::new(
                blank.clone(),
                stmt(REIFY_PREDICATE),
                Object::Predicate(self.p.clone()),
            ),
            Triple::new(blank.clone(), stmt(REIFY_OBJECT), self.o.clone()),
        ];
        (statements, blank)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.s, self.p, self.o)
    }
}

impl FromStr for Triple {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::Triple(line.to_string());
        let (s_text, rest) = line.split_once(' ').ok_or_else(bad)?;
        let rest = rest.trim_start();
        // The predicate ends at the first `]`; object text may itself
        // contain anchors, but they come later in the line.
        let p_end = rest.find(']').ok_or_else(bad)?;
        let (p_text, o_text) = rest.split_at(p_end + 1);
        let o_text = o_text.trim_start();
        if o_text.is_empty() {
            return Err(bad());
        }
        Ok(Triple::new(
            s_text.parse()?,
            p_text.parse()?,
            o_text.parse()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for line in [
            "/u<joe> \"parent_of\"@[] /u<mary>",
            "/u<joe> \"bought\"@[2016-04-10T04:21:00.000000000Z] /item<car>",
            "/u<joe> \"age\"@[] \"42\"^^type:int64",
            "/u<joe> \"nick\"@[] \"the joe\"^^type:text",
            "/u<joe> \"knows_since\"@[] \"met\"@[2016-04-10T04:21:00.000000000Z]",
        ] {
            let t: Triple = line.parse().unwrap();
            assert_eq!(t.to_string(), line);
        }
    }

    #[test]
    fn positions() {
        let t: Triple = "/u<joe> \"parent_of\"@[] /u<mary>".parse().unwrap();
        assert_eq!(t.subject().id(), "joe");
        assert_eq!(t.predicate().id(), "parent_of");
        assert_eq!(t.object().node().unwrap().id(), "mary");
    }

    #[test]
    fn reify_emits_statements_about_the_anchor_triple() {
        let t: Triple = "/u<joe> \"bought\"@[2016-04-10T04:21:00.000000000Z] /item<car>"
            .parse()
            .unwrap();
        let (statements, blank) = t.reify();
        assert!(blank.is_blank());
        assert_eq!(statements.len(), 3);
        for st in &statements {
            assert_eq!(st.subject(), &blank);
            assert_eq!(st.predicate().anchor(), t.predicate().anchor());
        }
        assert_eq!(statements[0].predicate().id(), REIFY_SUBJECT);
        assert_eq!(statements[1].predicate().id(), REIFY_PREDICATE);
        assert_eq!(statements[2].predicate().id(), REIFY_OBJECT);
        assert_eq!(statements[0].object().node(), Some(t.subject()));
        assert_eq!(statements[1].object().predicate(), Some(t.predicate()));
        assert_eq!(statements[2].object(), t.object());
    }

    #[test]
    fn rejects_malformed() {
        for line in [
            "/u<joe>",
            "/u<joe> \"p\"@[]",
            "joe \"p\"@[] /u<mary>",
            "/u<joe> parent_of /u<mary>",
        ] {
            assert!(line.parse::<Triple>().is_err(), "accepted {line:?}");
        }
    }
}
