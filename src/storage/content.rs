//! Content-addressed body store: every fetched response body is written
//! once under its SHA-256 digest, so identical content discovered
//! through different URLs is stored exactly once.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("io error writing content object: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ContentStore {
    root: PathBuf,
}

/// Result of a content write: the object's digest, its on-disk path,
/// and whether this call is the one that created it.
pub struct WriteResult {
    pub sha256: String,
    pub path: PathBuf,
    pub is_new: bool,
}

impl ContentStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self { root: data_dir.as_ref().join("content") }
    }

    fn path_for(&self, sha256: &str) -> PathBuf {
        self.root.join(&sha256[..2]).join(format!("{}.bin", sha256))
    }

    /// Writes `body` under its digest if not already present. Write is
    /// atomic: content goes to a temp file in the target shard
    /// directory, then an OS-level rename into place, so a concurrent
    /// reader never observes a partially-written object.
    pub fn write(&self, body: &[u8]) -> Result<WriteResult, ContentStoreError> {
        let sha256 = hex::encode(Sha256::digest(body));
        let path = self.path_for(&sha256);

        if path.exists() {
            return Ok(WriteResult { sha256, path, is_new: false });
        }

        let shard_dir = path.parent().expect("path_for always has a parent");
        std::fs::create_dir_all(shard_dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(shard_dir)?;
        tmp.write_all(body)?;
        tmp.flush()?;
        match tmp.persist(&path) {
            Ok(_) => {}
            // Another writer raced us to the same digest; the content
            // is identical by construction, so this is not an error.
            Err(e) if path.exists() => drop(e),
            Err(e) => return Err(e.error.into()),
        }

        Ok(WriteResult { sha256, path, is_new: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_sharded_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());
        let result = store.write(b"hello world").unwrap();
        assert!(result.is_new);
        assert!(result.path.exists());
        assert_eq!(
            result.path,
            dir.path().join("content").join(&result.sha256[..2]).join(format!("{}.bin", result.sha256))
        );
    }

    #[test]
    fn test_write_same_body_twice_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());
        let first = store.write(b"same body").unwrap();
        let second = store.write(b"same body").unwrap();
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.sha256, second.sha256);
        assert_eq!(first.path, second.path);
    }

    #[test]
    fn test_different_bodies_different_digests() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());
        let a = store.write(b"a").unwrap();
        let b = store.write(b"b").unwrap();
        assert_ne!(a.sha256, b.sha256);
    }
}
