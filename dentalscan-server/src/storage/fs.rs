//! Filesystem blob storage

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{object_url, validate_key, BlobStore, StorageError, StoredObject};

/// Suffix of the file holding an object's content type
const CONTENT_TYPE_SUFFIX: &str = ".content-type";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Stores each object as a file under `root`, mirroring the key's path
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    /// `base_url` is the prefix of the URLs returned by `put`.
    pub fn new(
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            base_url: base_url.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn content_type_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(CONTENT_TYPE_SUFFIX);
        PathBuf::from(name)
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, bytes)?;
        fs::write(Self::content_type_path(&path), content_type)?;

        tracing::debug!(key = %key, size = bytes.len(), "Stored object");
        Ok(object_url(&self.base_url, key))
    }

    fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let path = self.object_path(key)?;

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let content_type = match fs::read_to_string(Self::content_type_path(&path)) {
            Ok(content_type) => content_type,
            Err(e) if e.kind() == ErrorKind::NotFound => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(StoredObject {
            bytes,
            content_type,
        }))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;

        for target in [Self::content_type_path(&path), path] {
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
