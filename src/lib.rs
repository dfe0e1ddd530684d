#![deny(missing_docs)]

//! Key/value buckets on top of a remote record store.
//!
//! Each bucket maps to one named record of a [`RecordBackend`]. The record is
//! created on first use, labelled with the bucket, the application and the
//! owner, and holds every entry of the bucket.
//!
//! ```
//! use bucket_kv::{BucketStore, MemoryBackend};
//!
//! let store = BucketStore::new(MemoryBackend::new(), "my-app", "settings")?;
//! store.put("theme", b"dark")?;
//! assert_eq!(store.get("theme")?, b"dark".to_vec());
//! # Ok::<(), bucket_kv::Error>(())
//! ```

pub mod backend;
pub mod bucket;
mod error;
pub mod record;

pub use backend::{BackendError, MemoryBackend, RecordBackend, SledBackend};
pub use bucket::BucketStore;
pub use error::{Error, Result};
pub use record::Record;
