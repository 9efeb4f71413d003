//! Object storage for uploaded images

pub mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;

use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// A stored object and the content type it was written with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Trait for storing uploaded image bytes under a relative key
pub trait BlobStore: Send + Sync {
    /// Write an object, replacing any existing one under `key`, and return its URL
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;

    /// Remove an object; missing keys are not an error
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Keys are relative, `/`-separated paths with no empty, `.` or `..` segments
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Join a base URL and a key
pub fn object_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("submissions/1/1700000000000-teeth.jpg").is_ok());

        for bad in ["", "/etc/passwd", "a/../b", "a//b", "./a", "a\\b", "a/"] {
            assert!(validate_key(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_object_url() {
        assert_eq!(
            object_url("http://localhost:3000/files/", "submissions/1/a.jpg"),
            "http://localhost:3000/files/submissions/1/a.jpg"
        );
    }
}
