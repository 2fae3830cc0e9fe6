//! Filesystem blob store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::BlobStore;
use crate::error::BlobError;

/// Stores each blob as a file at `{root}/{key}`
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key onto a path under the root. Keys are `/`-separated and may
    /// not contain empty, `.` or `..` segments.
    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let valid = !key.is_empty()
            && !key.contains('\\')
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if !valid {
            return Err(BlobError::InvalidKey {
                key: key.to_string(),
            });
        }

        Ok(self.root.join(key))
    }

    /// Remove now-empty directories between the deleted file and the root
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            // Fails when not empty, which ends the walk
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        let io_error = |source| BlobError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        // Write-then-rename so readers never observe a partial blob
        let staging = path.with_extension("partial");
        std::fs::write(&staging, data).map_err(io_error)?;
        std::fs::rename(&staging, &path).map_err(io_error)?;

        debug!(key = %key, size = data.len(), "Stored blob");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.path_for(key)?;

        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BlobError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn delete(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.path_for(key)?;

        match std::fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_parents(&path);
                debug!(key = %key, "Deleted blob");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(BlobError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("documents/d1/report.pdf", b"%PDF-1.4").unwrap();
        assert_eq!(
            store.get("documents/d1/report.pdf").unwrap(),
            Some(b"%PDF-1.4".to_vec())
        );

        assert!(store.delete("documents/d1/report.pdf").unwrap());
        assert_eq!(store.get("documents/d1/report.pdf").unwrap(), None);
        assert!(!dir.path().join("documents").exists());
    }

    #[test]
    fn test_delete_missing_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(!store.delete("pictures/none/page1_img1.jpg").unwrap());
    }

    #[test]
    fn test_prune_keeps_siblings() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("pictures/d1/page1_img1.jpg", b"a").unwrap();
        store.put("pictures/d1/page1_img2.jpg", b"b").unwrap();
        store.delete("pictures/d1/page1_img1.jpg").unwrap();

        assert_eq!(
            store.get("pictures/d1/page1_img2.jpg").unwrap(),
            Some(b"b".to_vec())
        );
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        for key in ["", "../etc/passwd", "a//b", "/abs", "a/./b", "a\\b"] {
            assert!(
                matches!(store.put(key, b"x"), Err(BlobError::InvalidKey { .. })),
                "key {key:?} should be rejected"
            );
        }
    }
}
