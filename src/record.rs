//! Record stored by a backend

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// A named record held by a [`RecordBackend`](crate::backend::RecordBackend).
///
/// Values that are valid UTF-8 live in `data`, anything else lives in
/// `binary_data`. A key is present in at most one of the two maps.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Record name, equal to the bucket name
    pub name: String,

    /// Metadata tags, set once at creation
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Text entries, `None` when the backend never initialized it
    #[serde(default)]
    pub data: Option<HashMap<String, String>>,

    /// Binary entries, `None` when the backend never initialized it
    #[serde(default)]
    pub binary_data: Option<HashMap<String, Vec<u8>>>,

    /// Assigned by the backend on every create and update
    #[serde(default)]
    pub resource_version: u64,
}

impl Record {
    /// Create an empty record with the given labels.
    pub fn new(name: impl Into<String>, labels: BTreeMap<String, String>) -> Self {
        Record {
            name: name.into(),
            labels,
            data: Some(HashMap::new()),
            binary_data: Some(HashMap::new()),
            resource_version: 0,
        }
    }

    /// Replace uninitialized data maps with empty ones and drop binary
    /// entries shadowed by a text entry of the same key.
    pub fn normalize(&mut self) {
        let data = self.data.get_or_insert_with(HashMap::new);
        self.binary_data
            .get_or_insert_with(HashMap::new)
            .retain(|key, _| !data.contains_key(key));
    }

    /// Look up the value stored under `key`.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(value) = self.data.as_ref().and_then(|data| data.get(key)) {
            return Some(value.clone().into_bytes());
        }

        self.binary_data
            .as_ref()
            .and_then(|data| data.get(key))
            .cloned()
    }

    /// Store `value` under `key`, overwriting any previous value.
    pub fn set_value(&mut self, key: &str, value: &[u8]) {
        match std::str::from_utf8(value) {
            Ok(text) => {
                if let Some(binary) = self.binary_data.as_mut() {
                    binary.remove(key);
                }
                self.data
                    .get_or_insert_with(HashMap::new)
                    .insert(key.to_owned(), text.to_owned());
            }
            Err(_) => {
                if let Some(data) = self.data.as_mut() {
                    data.remove(key);
                }
                self.binary_data
                    .get_or_insert_with(HashMap::new)
                    .insert(key.to_owned(), value.to_vec());
            }
        }
    }

    /// Remove `key` from the record. Returns whether it was present.
    pub fn remove_value(&mut self, key: &str) -> bool {
        let text = self
            .data
            .as_mut()
            .map_or(false, |data| data.remove(key).is_some());
        let binary = self
            .binary_data
            .as_mut()
            .map_or(false, |data| data.remove(key).is_some());
        text || binary
    }

    /// Every entry whose key starts with `prefix`. A text entry wins over a
    /// binary one with the same key, as in [`Record::value`].
    pub fn entries_with_prefix(&self, prefix: &str) -> HashMap<String, Vec<u8>> {
        let text = self
            .data
            .iter()
            .flatten()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone().into_bytes()));
        let binary = self
            .binary_data
            .iter()
            .flatten()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()));

        binary.chain(text).collect()
    }

    /// Payload size in bytes: keys plus values across both maps.
    pub fn size(&self) -> usize {
        let text: usize = self
            .data
            .iter()
            .flatten()
            .map(|(key, value)| key.len() + value.len())
            .sum();
        let binary: usize = self
            .binary_data
            .iter()
            .flatten()
            .map(|(key, value)| key.len() + value.len())
            .sum();
        text + binary
    }
}
