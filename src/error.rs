//! Errors returned by bucket operations

use thiserror::Error;

use crate::backend::BackendError;

/// Result for bucket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error for bucket operations
#[derive(Error, Debug)]
pub enum Error {
    /// The key is not present in the bucket
    #[error("Key not found, `{0}` is not found")]
    NotFound(String),

    /// The backend failed to fetch, create, update or delete the record
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl Error {
    /// Whether this is the expected "key is absent" outcome of a lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
