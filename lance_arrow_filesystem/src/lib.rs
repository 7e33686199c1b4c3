//! Filesystem resolution for the [`lance_arrow`](https://docs.rs/lance_arrow/latest/lance_arrow/index.html) crate.
//!
//! A [`FileSystem`] opens readable byte streams for paths.
//! A [`FileSystemResolver`] maps a URI to a registered [`FileSystem`] and a path within it, keyed by URI scheme.
//!
//! The default resolver handles bare local paths (an empty scheme) and `file://` URIs with a [`LocalFileSystem`].
//! With the `object_store` feature it also handles `s3://` and `gs://` URIs with an `ObjectStoreFileSystem`.
//! Any scheme can be served by registering a [`FileSystem`] for it, e.g.
//! ```
//! # use std::sync::Arc;
//! use lance_arrow_filesystem::{FileSystemResolver, MemoryFileSystem};
//!
//! let bucket = Arc::new(MemoryFileSystem::new());
//! bucket.put("bucket/image.png", vec![0u8, 1, 2]);
//!
//! let mut resolver = FileSystemResolver::default();
//! resolver.register("s3", bucket);
//! let (filesystem, path) = resolver.resolve("s3://bucket/image.png")?;
//! assert_eq!(path, "bucket/image.png");
//! assert_eq!(filesystem.read(&path)?, vec![0u8, 1, 2]);
//! # Ok::<(), lance_arrow_filesystem::FileSystemError>(())
//! ```
//!
//! ## Licence
//! `lance_arrow_filesystem` is licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>.

mod local;
mod memory;
#[cfg(feature = "object_store")]
mod object_store_filesystem;

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;
#[cfg(feature = "object_store")]
pub use object_store_filesystem::ObjectStoreFileSystem;

use std::{collections::HashMap, fmt::Debug, io::Read, sync::Arc};

use thiserror::Error;

/// A readable byte stream returned by [`FileSystem::open_input_stream`].
///
/// The stream is closed when it is dropped.
pub type InputStream<'a> = Box<dyn Read + Send + 'a>;

/// A filesystem error.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// An underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The URI could not be mapped to a path.
    #[error("URI {0} cannot be resolved to a path")]
    InvalidUri(String),
    /// No filesystem is registered for the URI scheme.
    #[error("no filesystem is registered for URI scheme {0:?}")]
    UnsupportedScheme(String),
    /// The path does not exist.
    #[error("path {0} does not exist")]
    NotFound(String),
    /// An object store error.
    #[cfg(feature = "object_store")]
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
}

/// Traits for a readable filesystem.
pub trait FileSystem: Debug + Send + Sync {
    /// Open a sequential input stream for `path`.
    ///
    /// # Errors
    /// Returns a [`FileSystemError`] if `path` does not exist or cannot be opened.
    fn open_input_stream(&self, path: &str) -> Result<InputStream<'_>, FileSystemError>;

    /// Read the entire content of `path`.
    ///
    /// The input stream is dropped before returning, including when reading fails.
    ///
    /// # Errors
    /// Returns a [`FileSystemError`] if the stream cannot be opened or read.
    fn read(&self, path: &str) -> Result<Vec<u8>, FileSystemError> {
        let mut stream = self.open_input_stream(path)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// [`Arc`] wrapped filesystem.
pub type FileSystemRef = Arc<dyn FileSystem>;

/// Maps URIs to a [`FileSystem`] and a path within it.
///
/// Schemes are compared in lower case. The empty scheme identifies bare paths.
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    filesystems: HashMap<String, FileSystemRef>,
}

impl Default for FileSystemResolver {
    /// A resolver handling bare paths and `file://` URIs with a [`LocalFileSystem`].
    ///
    /// With the `object_store` feature, `s3://` and `gs://` URIs are handled by an `ObjectStoreFileSystem`.
    fn default() -> Self {
        let local: FileSystemRef = Arc::new(LocalFileSystem::new());
        let mut resolver = Self::empty();
        resolver.register("", local.clone());
        resolver.register("file", local);
        #[cfg(feature = "object_store")]
        for scheme in ["s3", "gs"] {
            match ObjectStoreFileSystem::new(scheme) {
                Ok(filesystem) => {
                    resolver.register(scheme, Arc::new(filesystem));
                }
                Err(err) => log::warn!("cannot create a filesystem for scheme {scheme:?}: {err}"),
            }
        }
        resolver
    }
}

impl FileSystemResolver {
    /// Create a resolver with no registered filesystems.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            filesystems: HashMap::new(),
        }
    }

    /// Register `filesystem` for URIs with `scheme`, replacing any previous registration.
    pub fn register(&mut self, scheme: &str, filesystem: FileSystemRef) -> &mut Self {
        log::debug!("registering filesystem {filesystem:?} for scheme {scheme:?}");
        self.filesystems
            .insert(scheme.to_ascii_lowercase(), filesystem);
        self
    }

    /// Returns the filesystem registered for `scheme`, if any.
    #[must_use]
    pub fn filesystem(&self, scheme: &str) -> Option<&FileSystemRef> {
        self.filesystems.get(&scheme.to_ascii_lowercase())
    }

    /// Resolve `uri` to a filesystem and a path within it.
    ///
    /// - A bare path (no scheme) is returned unchanged.
    /// - A `file://` URI is converted to a local path.
    /// - Any other URI `scheme://host/key` resolves to the path `host/key`, with the key percent-decoded.
    ///
    /// # Errors
    /// Returns [`FileSystemError::UnsupportedScheme`] if no filesystem is registered for the scheme, or
    /// [`FileSystemError::InvalidUri`] if the URI cannot be mapped to a path.
    pub fn resolve(&self, uri: &str) -> Result<(FileSystemRef, String), FileSystemError> {
        let (scheme, path) = split_uri(uri)?;
        let filesystem = self
            .filesystem(&scheme)
            .ok_or(FileSystemError::UnsupportedScheme(scheme))?
            .clone();
        Ok((filesystem, path))
    }
}

/// Split `uri` into a lower case scheme and a path.
fn split_uri(uri: &str) -> Result<(String, String), FileSystemError> {
    #[cfg(target_os = "windows")]
    if std::path::Path::new(uri).is_absolute() {
        return Ok((String::new(), uri.to_string()));
    }

    match url::Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| FileSystemError::InvalidUri(uri.to_string()))?;
            let path = path
                .to_str()
                .ok_or_else(|| FileSystemError::InvalidUri(uri.to_string()))?
                .to_string();
            Ok(("file".to_string(), path))
        }
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            let key = percent_encoding::percent_decode_str(url.path())
                .decode_utf8()
                .map_err(|_| FileSystemError::InvalidUri(uri.to_string()))?;
            Ok((url.scheme().to_string(), format!("{host}{key}")))
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok((String::new(), uri.to_string())),
        Err(_) => Err(FileSystemError::InvalidUri(uri.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uri_schemes() {
        assert_eq!(
            split_uri("/tmp/a.png").unwrap(),
            (String::new(), "/tmp/a.png".to_string())
        );
        assert_eq!(
            split_uri("relative/a.png").unwrap(),
            (String::new(), "relative/a.png".to_string())
        );
        assert_eq!(
            split_uri("s3://bucket/dir/b.png").unwrap(),
            ("s3".to_string(), "bucket/dir/b.png".to_string())
        );
        assert_eq!(
            split_uri("GS://bucket/c.png").unwrap(),
            ("gs".to_string(), "bucket/c.png".to_string())
        );
    }

    #[test]
    fn split_uri_percent_decoded() {
        assert_eq!(
            split_uri("s3://bucket/a b.png").unwrap(),
            ("s3".to_string(), "bucket/a b.png".to_string())
        );
        assert_eq!(
            split_uri("s3://bucket/dir/%E2%82%AC%2520.png").unwrap(),
            ("s3".to_string(), "bucket/dir/\u{20ac}%20.png".to_string())
        );
        assert!(matches!(
            split_uri("s3://bucket/%FF.png"),
            Err(FileSystemError::InvalidUri(_))
        ));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn split_uri_file() {
        assert_eq!(
            split_uri("file:///tmp/a%20b.png").unwrap(),
            ("file".to_string(), "/tmp/a b.png".to_string())
        );
    }

    #[cfg(not(feature = "object_store"))]
    #[test]
    fn resolver_unsupported_scheme() {
        let resolver = FileSystemResolver::default();
        assert!(matches!(
            resolver.resolve("s3://bucket/b.png"),
            Err(FileSystemError::UnsupportedScheme(scheme)) if scheme == "s3"
        ));
        assert!(resolver.resolve("/tmp/a.png").is_ok());
        assert!(FileSystemResolver::empty().resolve("/tmp/a.png").is_err());
    }

    #[cfg(feature = "object_store")]
    #[test]
    fn resolver_object_store_schemes() {
        let resolver = FileSystemResolver::default();
        for uri in ["s3://bucket/b.png", "gs://bucket/c.png"] {
            assert!(resolver.resolve(uri).is_ok(), "{uri}");
        }
        assert!(matches!(
            resolver.resolve("ftp://host/b.png"),
            Err(FileSystemError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }
}
