//! Bucket store
//!
//! A bucket is a named key/value namespace backed by exactly one record of a
//! [`RecordBackend`]. Every operation fetches the record (creating it when it
//! does not exist yet), works on that copy and, for writes, sends the whole
//! record back. Nothing is cached between calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use log::debug;

use crate::backend::{BackendError, RecordBackend};
use crate::error::{Error, Result};
use crate::record::Record;

/// Label holding the bucket name
pub const LABEL_BUCKET: &str = "BUCKET";
/// Label holding the application name
pub const LABEL_APP: &str = "APP";
/// Label marking records managed by this crate
pub const LABEL_OWNER: &str = "OWNER";
/// Value of [`LABEL_OWNER`]
pub const OWNER: &str = "K8S-KV";

/// Key/value access to one bucket.
///
/// Reads take a shared lock and writes an exclusive one, so the
/// fetch-modify-update sequence of concurrent writes through the same
/// `BucketStore` never interleaves. Nothing coordinates separate instances
/// or processes: their writes race and the last update wins.
pub struct BucketStore<B: RecordBackend> {
    app: String,
    bucket: String,
    backend: B,
    lock: RwLock<()>,
}

impl<B: RecordBackend> BucketStore<B> {
    /// Open the bucket called `bucket` on `backend`, creating its record if
    /// it does not exist yet. `app` is recorded as a label on new records.
    pub fn new(backend: B, app: impl Into<String>, bucket: impl Into<String>) -> Result<Self> {
        let store = BucketStore {
            app: app.into(),
            bucket: bucket.into(),
            backend,
            lock: RwLock::new(()),
        };

        {
            let _guard = store.lock.write().unwrap_or_else(PoisonError::into_inner);
            store.resolve()?;
        }

        Ok(store)
    }

    /// Application name put on the record's labels.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Bucket name, also the backing record's name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Store `value` under `key`, overwriting any previous value.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.resolve()?;
        record.set_value(key, value);
        debug!("put {:?} into bucket {:?}", key, self.bucket);

        self.backend.update(record)?;
        Ok(())
    }

    /// Get the value stored under `key`.
    /// Return `Error::NotFound` if the key is absent.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);

        self.resolve()?
            .value(key)
            .ok_or_else(|| Error::NotFound(key.to_owned()))
    }

    /// Remove `key` from the bucket. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.resolve()?;
        let existed = record.remove_value(key);
        debug!(
            "delete {:?} from bucket {:?}, existed: {}",
            key, self.bucket, existed
        );

        self.backend.update(record)?;
        Ok(())
    }

    /// Every entry whose key starts with `prefix`. An empty prefix matches
    /// everything. The map's iteration order means nothing.
    pub fn list(&self, prefix: &str) -> Result<HashMap<String, Vec<u8>>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);

        Ok(self.resolve()?.entries_with_prefix(prefix))
    }

    /// Delete the bucket's record and with it every entry. The next operation
    /// on this store starts from a fresh empty record.
    pub fn teardown(&self) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        debug!("tearing down bucket {:?}", self.bucket);
        self.backend.delete(&self.bucket)?;
        Ok(())
    }

    /// Fetch the bucket's record, creating it if the backend has none.
    fn resolve(&self) -> Result<Record> {
        match self.backend.fetch(&self.bucket) {
            Ok(mut record) => {
                record.normalize();
                Ok(record)
            }
            Err(BackendError::NotFound(_)) => self.create(),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self) -> Result<Record> {
        debug!("creating record for bucket {:?} (app {:?})", self.bucket, self.app);

        let record = Record::new(self.bucket.clone(), labels(&self.bucket, &self.app));
        let mut created = self.backend.create(record)?;
        created.normalize();
        Ok(created)
    }
}

/// Labels put on a newly created bucket record.
fn labels(bucket: &str, app: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_BUCKET.to_owned(), bucket.to_owned());
    labels.insert(LABEL_APP.to_owned(), app.to_owned());
    labels.insert(LABEL_OWNER.to_owned(), OWNER.to_owned());
    labels
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;

    use super::*;
    use crate::backend::BackendResult;

    /// Returns a fixed record from `fetch` and remembers what it was asked to write.
    #[derive(Default)]
    struct FakeBackend {
        fetched: Option<Record>,
        created: Mutex<Option<Record>>,
        updated: Mutex<Option<Record>>,
        deleted: Mutex<Option<String>>,
    }

    impl FakeBackend {
        fn with_data(pairs: &[(&str, &str)]) -> Self {
            let data = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            FakeBackend {
                fetched: Some(Record {
                    name: "b1".to_owned(),
                    data: Some(data),
                    ..Default::default()
                }),
                ..Default::default()
            }
        }
    }

    impl RecordBackend for FakeBackend {
        fn fetch(&self, name: &str) -> BackendResult<Record> {
            self.fetched
                .clone()
                .ok_or_else(|| BackendError::NotFound(name.to_owned()))
        }

        fn create(&self, record: Record) -> BackendResult<Record> {
            *self.created.lock().unwrap() = Some(record.clone());
            Ok(record)
        }

        fn update(&self, record: Record) -> BackendResult<Record> {
            *self.updated.lock().unwrap() = Some(record.clone());
            Ok(record)
        }

        fn delete(&self, name: &str) -> BackendResult<()> {
            *self.deleted.lock().unwrap() = Some(name.to_owned());
            Ok(())
        }
    }

    /// Fails every call with a non-"not found" error.
    struct BrokenBackend;

    impl RecordBackend for BrokenBackend {
        fn fetch(&self, _name: &str) -> BackendResult<Record> {
            Err(BackendError::Other(anyhow!("connection refused")))
        }

        fn create(&self, _record: Record) -> BackendResult<Record> {
            panic!("create must not be attempted after a failed fetch")
        }

        fn update(&self, _record: Record) -> BackendResult<Record> {
            Err(BackendError::Other(anyhow!("connection refused")))
        }

        fn delete(&self, _name: &str) -> BackendResult<()> {
            Err(BackendError::Other(anyhow!("connection refused")))
        }
    }

    /// Reports every record as missing and refuses to create one.
    struct CreateFailingBackend;

    impl RecordBackend for CreateFailingBackend {
        fn fetch(&self, name: &str) -> BackendResult<Record> {
            Err(BackendError::NotFound(name.to_owned()))
        }

        fn create(&self, _record: Record) -> BackendResult<Record> {
            Err(BackendError::Other(anyhow!("quota exceeded")))
        }

        fn update(&self, _record: Record) -> BackendResult<Record> {
            panic!("update must not be attempted without a record")
        }

        fn delete(&self, name: &str) -> BackendResult<()> {
            Err(BackendError::NotFound(name.to_owned()))
        }
    }

    #[test]
    fn resolve_returns_existing_record() {
        let fake = FakeBackend::with_data(&[("foo", "bar")]);
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        let record = store.resolve().unwrap();

        assert_eq!(record.data.unwrap()["foo"], "bar");
        assert!(fake.created.lock().unwrap().is_none());
    }

    #[test]
    fn resolve_normalizes_uninitialized_data() {
        let fake = FakeBackend {
            fetched: Some(Record {
                name: "b1".to_owned(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        let record = store.resolve().unwrap();

        assert_eq!(record.data, Some(HashMap::new()));
        assert_eq!(record.binary_data, Some(HashMap::new()));
        assert!(store.list("").unwrap().is_empty());
    }

    #[test]
    fn new_creates_labelled_record() {
        let fake = FakeBackend::default();
        BucketStore::new(&fake, "app", "b1").unwrap();

        let created = fake.created.lock().unwrap().clone().unwrap();
        assert_eq!(created.name, "b1");
        assert_eq!(created.labels[LABEL_BUCKET], "b1");
        assert_eq!(created.labels[LABEL_APP], "app");
        assert_eq!(created.labels[LABEL_OWNER], "K8S-KV");
        assert_eq!(created.labels.len(), 3);
        assert_eq!(created.data, Some(HashMap::new()));
    }

    #[test]
    fn get_existing_key() {
        let fake = FakeBackend::with_data(&[("foo", "bar")]);
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        assert_eq!(store.get("foo").unwrap(), b"bar".to_vec());
    }

    #[test]
    fn get_missing_key() {
        let fake = FakeBackend::with_data(&[("foo", "bar")]);
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        let err = store.get("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn put_writes_back_whole_record() {
        let fake = FakeBackend::with_data(&[
            ("a", "a-val"),
            ("b", "b-val"),
            ("c", "c-val"),
            ("d", "d-val"),
        ]);
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        store.put("b", b"updated").unwrap();

        let updated = fake.updated.lock().unwrap().clone().unwrap();
        let data = updated.data.unwrap();
        assert_eq!(data["b"], "updated");
        assert_eq!(data["a"], "a-val");
        assert_eq!(data["c"], "c-val");
        assert_eq!(data["d"], "d-val");
    }

    #[test]
    fn delete_missing_key_still_writes_back() {
        let fake = FakeBackend::with_data(&[("a", "a-val")]);
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        store.delete("nope").unwrap();

        let updated = fake.updated.lock().unwrap().clone().unwrap();
        assert_eq!(updated.data.unwrap().len(), 1);
    }

    #[test]
    fn teardown_deletes_bucket_record() {
        let fake = FakeBackend::with_data(&[]);
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        store.teardown().unwrap();

        assert_eq!(fake.deleted.lock().unwrap().as_deref(), Some("b1"));
    }

    #[test]
    fn get_and_list_agree_on_key_in_both_maps() {
        let mut fake = FakeBackend::with_data(&[("k", "text")]);
        let mut binary_data = HashMap::new();
        binary_data.insert("k".to_owned(), vec![0xff]);
        fake.fetched.as_mut().unwrap().binary_data = Some(binary_data);
        let store = BucketStore::new(&fake, "app", "b1").unwrap();

        let listed = store.list("").unwrap();

        assert_eq!(store.get("k").unwrap(), b"text".to_vec());
        assert_eq!(listed.len(), 1);
        assert_eq!(listed["k"], b"text".to_vec());
    }

    #[test]
    fn create_failure_after_missing_record_is_backend_error() {
        let err = BucketStore::new(CreateFailingBackend, "app", "b1")
            .err()
            .unwrap();

        assert!(matches!(err, Error::Backend(BackendError::Other(_))));
        assert!(!err.is_not_found());
    }

    #[test]
    fn backend_failure_is_not_treated_as_missing() {
        let err = BucketStore::new(BrokenBackend, "app", "b1").err().unwrap();

        assert!(matches!(err, Error::Backend(BackendError::Other(_))));
        assert!(!err.is_not_found());
    }
}
