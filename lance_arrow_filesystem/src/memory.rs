//! An in-memory filesystem.

use std::{collections::BTreeMap, io::Cursor};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{FileSystem, FileSystemError, InputStream};

/// An in-memory filesystem.
///
/// Useful as a stand-in for an object store in tests, or for serving preloaded content.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryFileSystem {
    /// Create a new empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `path`, replacing any existing content.
    pub fn put(&self, path: &str, value: impl Into<Bytes>) {
        self.files.write().insert(path.to_string(), value.into());
    }

    /// Remove the content at `path`, returning true if it existed.
    pub fn erase(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Returns the number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Returns true if no files are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl FileSystem for MemoryFileSystem {
    fn open_input_stream(&self, path: &str) -> Result<InputStream<'_>, FileSystemError> {
        // Bytes is reference counted, the stream does not hold the lock
        let value = self
            .files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| FileSystemError::NotFound(path.to_string()))?;
        Ok(Box::new(Cursor::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_filesystem() {
        let filesystem = MemoryFileSystem::new();
        assert!(filesystem.is_empty());
        filesystem.put("a", vec![1u8, 2, 3]);
        filesystem.put("b", Bytes::from_static(b"xyz"));
        assert_eq!(filesystem.len(), 2);
        assert_eq!(filesystem.read("a").unwrap(), vec![1, 2, 3]);
        assert_eq!(filesystem.read("b").unwrap(), b"xyz".to_vec());
        assert!(matches!(
            filesystem.read("c"),
            Err(FileSystemError::NotFound(path)) if path == "c"
        ));
        assert!(filesystem.erase("a"));
        assert!(!filesystem.erase("a"));
        assert!(filesystem.read("a").is_err());
    }
}
