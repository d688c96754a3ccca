use thiserror::Error;

/// Failure to decode one of the textual value forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid node text: {0}")]
    Node(String),

    #[error("invalid predicate text: {0}")]
    Predicate(String),

    #[error("invalid time anchor: {0}")]
    Anchor(String),

    #[error("invalid literal text: {0}")]
    Literal(String),

    #[error("invalid triple line: {0}")]
    Triple(String),
}

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("graph {0} already exists")]
    GraphExists(String),

    #[error("graph {0} not found")]
    GraphNotFound(String),

    #[error("operation canceled")]
    Canceled,

    #[error("result stream failure: {0}")]
    Stream(String),

    #[error("storage failure: {0}")]
    Internal(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
