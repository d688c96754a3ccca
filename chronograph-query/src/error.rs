//! Error and result types for the query crate.

use chronograph_api::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The statement violates an IR invariant: unbound projection,
    /// malformed temporal bounds, duplicate alias, and the like. Raised at
    /// plan construction.
    #[error("semantic error: {0}")]
    Semantic(String),

    /// No plan can be built for the statement.
    #[error("plan error: {0}")]
    Plan(String),

    /// Runtime failure during lookup, join, or post-processing.
    #[error("execution error: {0}")]
    Exec(String),

    #[error("operation canceled")]
    Canceled,

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Canceled => Error::Canceled,
            other => Error::Storage(other),
        }
    }
}
