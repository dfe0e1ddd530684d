//! sled backend

use std::path::PathBuf;

use log::debug;

use crate::backend::{check_size, BackendError, BackendResult, RecordBackend, MAX_RECORD_SIZE};
use crate::record::Record;

/// Record store persisted in a sled database, one bincode-encoded record per key.
#[derive(Clone)]
pub struct SledBackend {
    inner: sled::Db,
    max_record_size: usize,
}

impl SledBackend {
    /// Open a sled database at `path`, creating it if needed.
    pub fn open(path: impl Into<PathBuf>) -> BackendResult<SledBackend> {
        let path = path.into();
        debug!("opening sled backend at {:?}", path);
        let db = sled::open(path)?;

        Ok(SledBackend::from_db(db))
    }

    /// Wrap an already opened sled database.
    pub fn from_db(db: sled::Db) -> SledBackend {
        SledBackend {
            inner: db,
            max_record_size: MAX_RECORD_SIZE,
        }
    }

    /// Use a custom per-record size limit.
    pub fn with_max_record_size(mut self, max_record_size: usize) -> SledBackend {
        self.max_record_size = max_record_size;
        self
    }

    fn encode(&self, mut record: Record) -> BackendResult<(Record, Vec<u8>)> {
        check_size(&record, self.max_record_size)?;
        record.resource_version = self.inner.generate_id()?;
        let bytes = bincode::serialize(&record)?;
        Ok((record, bytes))
    }
}

impl RecordBackend for SledBackend {
    fn fetch(&self, name: &str) -> BackendResult<Record> {
        let bytes = self
            .inner
            .get(name)?
            .ok_or_else(|| BackendError::NotFound(name.to_owned()))?;

        Ok(bincode::deserialize(&bytes)?)
    }

    fn create(&self, record: Record) -> BackendResult<Record> {
        let (record, bytes) = self.encode(record)?;

        self.inner
            .compare_and_swap(record.name.as_str(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| BackendError::AlreadyExists(record.name.clone()))?;
        self.inner.flush()?;

        Ok(record)
    }

    fn update(&self, record: Record) -> BackendResult<Record> {
        let (record, bytes) = self.encode(record)?;

        // swap against the current value so a concurrent delete is not undone
        loop {
            let current = self
                .inner
                .get(record.name.as_str())?
                .ok_or_else(|| BackendError::NotFound(record.name.clone()))?;

            let swapped = self.inner.compare_and_swap(
                record.name.as_str(),
                Some(current),
                Some(bytes.clone()),
            )?;
            if swapped.is_ok() {
                break;
            }
        }
        self.inner.flush()?;

        Ok(record)
    }

    fn delete(&self, name: &str) -> BackendResult<()> {
        self.inner
            .remove(name)?
            .ok_or_else(|| BackendError::NotFound(name.to_owned()))?;
        self.inner.flush()?;

        Ok(())
    }
}
