//! record backends

pub mod memory;
pub mod sled_backend;

use std::sync::Arc;

use thiserror::Error;

use crate::record::Record;

pub use memory::MemoryBackend;
pub use sled_backend::SledBackend;

/// Largest record payload the shipped backends accept, in bytes.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Error for backend calls
#[derive(Error, Debug)]
pub enum BackendError {
    /// No record with this name exists
    #[error("record `{0}` not found")]
    NotFound(String),

    /// A record with this name already exists
    #[error("record `{0}` already exists")]
    AlreadyExists(String),

    /// The record payload exceeds the backend's limit
    #[error("record `{name}` is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Record name
        name: String,
        /// Payload size
        size: usize,
        /// Backend limit
        limit: usize,
    },

    /// sled error
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// bincode error
    #[error("encode record failed: {0}")]
    Codec(#[from] bincode::Error),

    /// Unknown error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// CRUD access to named records, called by `BucketStore`
pub trait RecordBackend: Send + Sync {
    /// Fetch the record called `name`.
    /// Return `BackendError::NotFound` if it does not exist.
    fn fetch(&self, name: &str) -> BackendResult<Record>;

    /// Create `record`, returning the record as stored by the backend.
    fn create(&self, record: Record) -> BackendResult<Record>;

    /// Replace the stored record with `record` entirely.
    fn update(&self, record: Record) -> BackendResult<Record>;

    /// Delete the record called `name`.
    fn delete(&self, name: &str) -> BackendResult<()>;
}

impl<B: RecordBackend + ?Sized> RecordBackend for &B {
    fn fetch(&self, name: &str) -> BackendResult<Record> {
        (**self).fetch(name)
    }

    fn create(&self, record: Record) -> BackendResult<Record> {
        (**self).create(record)
    }

    fn update(&self, record: Record) -> BackendResult<Record> {
        (**self).update(record)
    }

    fn delete(&self, name: &str) -> BackendResult<()> {
        (**self).delete(name)
    }
}

impl<B: RecordBackend + ?Sized> RecordBackend for Arc<B> {
    fn fetch(&self, name: &str) -> BackendResult<Record> {
        (**self).fetch(name)
    }

    fn create(&self, record: Record) -> BackendResult<Record> {
        (**self).create(record)
    }

    fn update(&self, record: Record) -> BackendResult<Record> {
        (**self).update(record)
    }

    fn delete(&self, name: &str) -> BackendResult<()> {
        (**self).delete(name)
    }
}

impl<B: RecordBackend + ?Sized> RecordBackend for Box<B> {
    fn fetch(&self, name: &str) -> BackendResult<Record> {
        (**self).fetch(name)
    }

    fn create(&self, record: Record) -> BackendResult<Record> {
        (**self).create(record)
    }

    fn update(&self, record: Record) -> BackendResult<Record> {
        (**self).update(record)
    }

    fn delete(&self, name: &str) -> BackendResult<()> {
        (**self).delete(name)
    }
}

/// Reject `record` if its payload is larger than `limit`.
pub(crate) fn check_size(record: &Record, limit: usize) -> BackendResult<()> {
    let size = record.size();
    if size > limit {
        return Err(BackendError::TooLarge {
            name: record.name.clone(),
            size,
            limit,
        });
    }
    Ok(())
}
