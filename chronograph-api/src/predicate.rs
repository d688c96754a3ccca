use crate::error::ParseError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A triple predicate, written `"id"@[]` (immutable) or
/// `"id"@[2016-04-10T04:21:00.000000000Z]` (temporal).
///
/// Immutable predicates are logically timeless; temporal predicates carry a
/// UTC anchor serialized as RFC 3339 with nanosecond precision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Predicate {
    id: String,
    anchor: Option<DateTime<Utc>>,
}

impl Predicate {
    pub fn new_immutable(id: &str) -> Result<Self, ParseError> {
        validate_id(id)?;
        Ok(Self {
            id: id.to_string(),
            anchor: None,
        })
    }

    pub fn new_temporal(id: &str, anchor: DateTime<Utc>) -> Result<Self, ParseError> {
        validate_id(id)?;
        Ok(Self {
            id: id.to_string(),
            anchor: Some(anchor),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn anchor(&self) -> Option<&DateTime<Utc>> {
        self.anchor.as_ref()
    }

    pub fn is_temporal(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn is_immutable(&self) -> bool {
        self.anchor.is_none()
    }

    /// The same predicate with its anchor stripped. Used when matching a
    /// predicate by id regardless of time.
    pub fn to_immutable(&self) -> Self {
        Self {
            id: self.id.clone(),
            anchor: None,
        }
    }

    pub(crate) fn from_parts(id: String, anchor: Option<DateTime<Utc>>) -> Self {
        Self { id, anchor }
    }
}

fn validate_id(id: &str) -> Result<(), ParseError> {
    if id.contains('"') {
        Err(ParseError::Predicate(format!("bad predicate id {id:?}")))
    } else {
        Ok(())
    }
}

/// Formats a time anchor in the canonical textual form.
pub fn format_anchor(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Decodes a canonical time anchor.
pub fn parse_anchor(s: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ParseError::Anchor(format!("{s:?}: {e}")))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.anchor {
            None => write!(f, "\"{}\"@[]", self.id),
            Some(t) => write!(f, "\"{}\"@[{}]", self.id, format_anchor(t)),
        }
    }
}

impl FromStr for Predicate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('"')
            .ok_or_else(|| ParseError::Predicate(s.to_string()))?;
        let mid = rest
            .find("\"@[")
            .ok_or_else(|| ParseError::Predicate(s.to_string()))?;
        let id = &rest[..mid];
        let anchor = rest[mid + 3..]
            .strip_suffix(']')
            .ok_or_else(|| ParseError::Predicate(s.to_string()))?;
        if anchor.is_empty() {
            Predicate::new_immutable(id)
        } else {
            Predicate::new_temporal(id, parse_anchor(anchor)?)
        }
    }
}
