//! Content-addressed blob storage for uploaded files.

use crate::error::IngestResult;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Stores raw uploads under `<root>/<first two hex chars>/<sha256>`.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// SHA-256 of `bytes` as lowercase hex.
    pub fn hash(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub fn path_for(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or("00");
        self.root.join(prefix).join(hash)
    }

    /// Write `bytes` and return their hash and path. Existing blobs are left untouched.
    pub fn put(&self, bytes: &[u8]) -> IngestResult<(String, PathBuf)> {
        let hash = Self::hash(bytes);
        let path = self.path_for(&hash);

        if path.exists() {
            debug!("Blob {} already stored", hash);
            return Ok((hash, path));
        }

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        // Write to a temp file in the same directory, then rename into place.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!("Stored blob {} ({} bytes)", hash, bytes.len());
        Ok((hash, path))
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.path_for(hash).exists()
    }

    /// Delete a blob. Returns false if it was not there.
    pub fn remove(&self, hash: &str) -> IngestResult<bool> {
        match fs::remove_file(self.path_for(hash)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        let (hash, path) = store.put(b"hello").unwrap();
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(path, dir.path().join("2c").join(&hash));
        assert_eq!(fs::read(store.path_for(&hash)).unwrap(), b"hello");

        let (again, _) = store.put(b"hello").unwrap();
        assert_eq!(again, hash);
        assert_eq!(fs::read_dir(dir.path().join("2c")).unwrap().count(), 1);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        let (hash, _) = store.put(b"bytes").unwrap();
        assert!(store.exists(&hash));
        assert!(store.remove(&hash).unwrap());
        assert!(!store.exists(&hash));
        assert!(!store.remove(&hash).unwrap());
    }
}
