//! in-memory backend

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;

use crate::backend::{check_size, BackendError, BackendResult, RecordBackend, MAX_RECORD_SIZE};
use crate::record::Record;

#[derive(Debug, Default)]
struct State {
    records: HashMap<String, Record>,
    version: u64,
}

/// Record store kept in process memory.
///
/// Clones share the same records, so a clone handed to a `BucketStore` can be
/// inspected through the original.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    max_record_size: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        MemoryBackend {
            state: Arc::new(Mutex::new(State::default())),
            max_record_size: MAX_RECORD_SIZE,
        }
    }

    /// Create an empty backend with a custom per-record size limit.
    pub fn with_max_record_size(max_record_size: usize) -> Self {
        MemoryBackend {
            max_record_size,
            ..Self::new()
        }
    }

    /// Snapshot of the record called `name`, if any.
    pub fn record(&self, name: &str) -> Option<Record> {
        self.inspect().records.get(name).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inspect().records.len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // inspection reads what is stored even after a writer panicked
    fn inspect(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| BackendError::Other(anyhow!("memory backend lock poisoned")))
    }
}

impl RecordBackend for MemoryBackend {
    fn fetch(&self, name: &str) -> BackendResult<Record> {
        self.lock()?
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(name.to_owned()))
    }

    fn create(&self, mut record: Record) -> BackendResult<Record> {
        check_size(&record, self.max_record_size)?;

        let mut state = self.lock()?;
        if state.records.contains_key(&record.name) {
            return Err(BackendError::AlreadyExists(record.name));
        }

        state.version += 1;
        record.resource_version = state.version;
        state.records.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, mut record: Record) -> BackendResult<Record> {
        check_size(&record, self.max_record_size)?;

        let mut state = self.lock()?;
        if !state.records.contains_key(&record.name) {
            return Err(BackendError::NotFound(record.name));
        }

        state.version += 1;
        record.resource_version = state.version;
        state.records.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    fn delete(&self, name: &str) -> BackendResult<()> {
        self.lock()?
            .records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(name.to_owned()))
    }
}
