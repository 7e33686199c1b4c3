//! Object store filesystems for `s3://` and `gs://` URIs.

use std::{collections::HashMap, io::Cursor, sync::Arc};

use object_store::{aws::AmazonS3Builder, gcp::GoogleCloudStorageBuilder, path::Path, ObjectStore};
use parking_lot::RwLock;

use crate::{FileSystem, FileSystemError, InputStream};

/// A filesystem over the buckets of an [`object_store`] service.
///
/// Paths have the form `bucket/key`. A store is created for each bucket on first use with
/// [`AmazonS3Builder::from_env`] (`s3`) or [`GoogleCloudStorageBuilder::from_env`] (`gs`), unless one was
/// supplied with [`ObjectStoreFileSystem::with_store`].
///
/// Requests run to completion on a runtime owned by the filesystem.
/// Reading from within an asynchronous execution context panics.
#[derive(Debug)]
pub struct ObjectStoreFileSystem {
    scheme: String,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
    runtime: tokio::runtime::Runtime,
}

impl ObjectStoreFileSystem {
    /// Create an object store filesystem for `scheme` (`s3` or `gs`).
    ///
    /// # Errors
    /// Returns [`FileSystemError::UnsupportedScheme`] if `scheme` is not an object store scheme, or
    /// [`FileSystemError::Io`] if the runtime cannot be created.
    pub fn new(scheme: &str) -> Result<Self, FileSystemError> {
        let scheme = scheme.to_ascii_lowercase();
        if !matches!(scheme.as_str(), "s3" | "gs") {
            return Err(FileSystemError::UnsupportedScheme(scheme));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            scheme,
            stores: RwLock::default(),
            runtime,
        })
    }

    /// Use `store` for `bucket` instead of a store built from the environment.
    #[must_use]
    pub fn with_store(self, bucket: &str, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.write().insert(bucket.to_string(), store);
        self
    }

    /// Returns the URI scheme of the filesystem.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, FileSystemError> {
        if let Some(store) = self.stores.read().get(bucket) {
            return Ok(store.clone());
        }
        let store: Arc<dyn ObjectStore> = match self.scheme.as_str() {
            "s3" => Arc::new(AmazonS3Builder::from_env().with_bucket_name(bucket).build()?),
            _ => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()?,
            ),
        };
        log::debug!("created {} store for bucket {bucket}", self.scheme);
        Ok(self
            .stores
            .write()
            .entry(bucket.to_string())
            .or_insert(store)
            .clone())
    }
}

impl FileSystem for ObjectStoreFileSystem {
    fn open_input_stream(&self, path: &str) -> Result<InputStream<'_>, FileSystemError> {
        let (bucket, key) = path
            .split_once('/')
            .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
            .ok_or_else(|| FileSystemError::InvalidUri(format!("{}://{path}", self.scheme)))?;
        let store = self.store(bucket)?;
        let location = Path::from(key);
        let bytes = self
            .runtime
            .block_on(async { store.get(&location).await?.bytes().await })
            .map_err(|err| match err {
                object_store::Error::NotFound { .. } => FileSystemError::NotFound(path.to_string()),
                err => FileSystemError::ObjectStore(err),
            })?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_store_filesystem_schemes() {
        assert_eq!(ObjectStoreFileSystem::new("S3").unwrap().scheme(), "s3");
        assert_eq!(ObjectStoreFileSystem::new("gs").unwrap().scheme(), "gs");
        assert!(matches!(
            ObjectStoreFileSystem::new("ftp"),
            Err(FileSystemError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn object_store_filesystem_invalid_path() {
        let filesystem = ObjectStoreFileSystem::new("s3").unwrap();
        for path in ["bucket", "bucket/", "/key.png"] {
            assert!(
                matches!(filesystem.read(path), Err(FileSystemError::InvalidUri(_))),
                "{path}"
            );
        }
    }
}
