//! In-memory blob storage for testing

use std::collections::HashMap;
use std::sync::RwLock;

use super::{object_url, validate_key, BlobStore, StorageError, StoredObject};

/// In-memory blob store
pub struct InMemoryBlobStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryBlobStore {
    /// `base_url` is the prefix of the URLs returned by `put`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        let mut objects = self.objects.write().map_err(|_| StorageError::Poisoned)?;
        objects.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(object_url(&self.base_url, key))
    }

    fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        validate_key(key)?;
        let objects = self.objects.read().map_err(|_| StorageError::Poisoned)?;
        Ok(objects.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut objects = self.objects.write().map_err(|_| StorageError::Poisoned)?;
        objects.remove(key);
        Ok(())
    }
}
