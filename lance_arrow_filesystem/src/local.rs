//! The local filesystem.

use std::{fs::File, io::BufReader};

use crate::{FileSystem, FileSystemError, InputStream};

/// A read-only view of the local filesystem.
///
/// Paths are used as given, relative paths resolve against the current working directory.
#[derive(Debug, Default, Clone)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Create a new local filesystem.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn open_input_stream(&self, path: &str) -> Result<InputStream<'_>, FileSystemError> {
        let file = File::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => FileSystemError::NotFound(path.to_string()),
            _ => FileSystemError::Io(err),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}
