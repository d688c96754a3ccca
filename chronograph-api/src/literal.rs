use crate::error::ParseError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A typed literal, written `"value"^^type:kind`.
///
/// `Float64` wraps [`OrderedFloat`] so literals are totally ordered and
/// hashable, which lets triples live in ordered sets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Text(String),
    Blob(Vec<u8>),
}

impl Literal {
    pub fn text(s: impl Into<String>) -> Self {
        Literal::Text(s.into())
    }

    pub fn float(v: f64) -> Self {
        Literal::Float64(OrderedFloat(v))
    }

    /// The `kind` half of the textual form.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "bool",
            Literal::Int64(_) => "int64",
            Literal::Float64(_) => "float64",
            Literal::Text(_) => "text",
            Literal::Blob(_) => "blob",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float64(v) => Some(v.into_inner()),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "\"{v}\"^^type:bool"),
            Literal::Int64(v) => write!(f, "\"{v}\"^^type:int64"),
            Literal::Float64(v) => write!(f, "\"{v}\"^^type:float64"),
            Literal::Text(v) => write!(f, "\"{v}\"^^type:text"),
            Literal::Blob(v) => {
                let bytes: Vec<String> = v.iter().map(|b| b.to_string()).collect();
                write!(f, "\"[{}]\"^^type:blob", bytes.join(" "))
            }
        }
    }
}

impl FromStr for Literal {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::Literal(s.to_string());
        let rest = s.strip_prefix('"').ok_or_else(bad)?;
        let mid = rest.rfind("\"^^type:").ok_or_else(bad)?;
        let value = &rest[..mid];
        let kind = &rest[mid + 8..];
        match kind {
            "bool" => value.parse().map(Literal::Bool).map_err(|_| bad()),
            "int64" => value.parse().map(Literal::Int64).map_err(|_| bad()),
            "float64" => value
                .parse()
                .map(|v| Literal::Float64(OrderedFloat(v)))
                .map_err(|_| bad()),
            "text" => Ok(Literal::Text(value.to_string())),
            "blob" => {
                let inner = value
                    .strip_prefix('[')
                    .and_then(|v| v.strip_suffix(']'))
                    .ok_or_else(bad)?;
                let bytes = inner
                    .split_whitespace()
                    .map(|b| b.parse::<u8>().map_err(|_| bad()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Literal::Blob(bytes))
            }
            _ => Err(bad()),
        }
    }
}
