/// In-memory object storage
///
/// Objects are kept in a map keyed by their public URL
/// (`memory://<bucket>/<path>`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectStorage, StorageError};

const SCHEME: &str = "memory://";

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Map-backed storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_deletes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent `delete` fail with `Upstream`
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, url: &str) -> Option<StoredObject> {
        self.objects().get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.objects().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = format!("{}{}/{}", SCHEME, bucket, path);
        self.objects().insert(
            url.clone(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Upstream("delete rejected".to_string()));
        }
        if !url.starts_with(SCHEME) {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }
        self.objects().remove(url);
        Ok(())
    }
}
