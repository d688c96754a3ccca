use std::fmt;

/// The error type for Chronograph operations.
#[derive(Debug)]
pub enum Error {
    /// Malformed textual value form.
    Parse(String),
    /// Error returned by the storage layer.
    Storage(String),
    /// Error during statement planning or execution.
    Query(String),
    /// The operation was canceled.
    Canceled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "parse error: {}", e),
            Error::Storage(e) => write!(f, "storage error: {}", e),
            Error::Query(e) => write!(f, "query error: {}", e),
            Error::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::error::Error for Error {}

// Convert lower-layer errors to strings to hide internal types.
impl From<chronograph_api::ParseError> for Error {
    fn from(e: chronograph_api::ParseError) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<chronograph_api::StorageError> for Error {
    fn from(e: chronograph_api::StorageError) -> Self {
        match e {
            chronograph_api::StorageError::Canceled => Error::Canceled,
            other => Error::Storage(other.to_string()),
        }
    }
}

impl From<chronograph_query::Error> for Error {
    fn from(e: chronograph_query::Error) -> Self {
        match e {
            chronograph_query::Error::Canceled => Error::Canceled,
            chronograph_query::Error::Storage(e) => Error::Storage(e.to_string()),
            other => Error::Query(other.to_string()),
        }
    }
}

/// A specialized Result type for Chronograph operations.
pub type Result<T> = std::result::Result<T, Error>;
