//! The `lance.arrow.image_uri` extension type: UTF-8 URIs of images.

use std::{any::Any, path::Path, sync::Arc};

use arrow_array::{cast::AsArray, ArrayRef, BinaryArray, StringArray};
use arrow_schema::DataType;
use lance_arrow_filesystem::FileSystemResolver;

use super::{
    EncodedImageArray, ExtensionArray, ExtensionClass, ExtensionError, ExtensionScalar,
    ExtensionType,
};

const IMAGE_URI_NAME: &str = "lance.arrow.image_uri";

/// URI schemes accepted by [`ImageUriArray::from_uris`]. The empty scheme is a bare path.
const SUPPORTED_SCHEMES: [&str; 4] = ["file", "s3", "gs", ""];

/// The `lance.arrow.image_uri` extension type, layered on `Utf8` storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ImageUriType;

impl ImageUriType {
    /// The extension type name.
    pub const NAME: &'static str = IMAGE_URI_NAME;
}

impl ExtensionType for ImageUriType {
    fn name(&self) -> &'static str {
        IMAGE_URI_NAME
    }

    fn storage_type(&self) -> DataType {
        DataType::Utf8
    }

    fn serialize(&self) -> Vec<u8> {
        Vec::new()
    }

    fn deserialize(
        &self,
        storage_type: &DataType,
        _serialized: &[u8],
    ) -> Result<Arc<dyn ExtensionType>, ExtensionError> {
        self.supports_storage_type(storage_type)?;
        Ok(Arc::new(Self))
    }

    fn array_class(&self) -> ExtensionClass {
        ExtensionClass::ImageUri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An array of image URIs.
pub type ImageUriArray = ExtensionArray<ImageUriType>;

/// A single image URI.
pub type ImageUriScalar<'a> = ExtensionScalar<'a, ImageUriType>;

/// Check that `uri` parses and has a supported scheme.
fn validate_uri(uri: &str) -> Result<(), ExtensionError> {
    let scheme = match url::Url::parse(uri) {
        Ok(url) => url.scheme().to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => String::new(),
        Err(_) => {
            return Err(ExtensionError::InvalidUri {
                uri: uri.to_string(),
                reason: "is not a valid URI",
            })
        }
    };
    if SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
        Ok(())
    } else {
        Err(ExtensionError::InvalidUri {
            uri: uri.to_string(),
            reason: "is not a supported scheme",
        })
    }
}

impl ImageUriArray {
    /// Create an image URI array from URIs or paths.
    ///
    /// Every URI must have a `file`, `s3`, or `gs` scheme, or be a bare path.
    /// URIs with a scheme must parse as a [WHATWG URL](https://url.spec.whatwg.org), so a host (bucket)
    /// containing a space or other forbidden host character is rejected. Spaces and non-ASCII
    /// characters are allowed in the path and are matched against the decoded object key.
    /// The whole batch is rejected if any entry is invalid.
    ///
    /// # Errors
    /// Returns [`ExtensionError::InvalidInputType`] if a path is not valid UTF-8, or
    /// [`ExtensionError::InvalidUri`] identifying the first invalid URI.
    pub fn from_uris<I, U>(uris: I) -> Result<Self, ExtensionError>
    where
        I: IntoIterator<Item = U>,
        U: AsRef<Path>,
    {
        let uris = uris
            .into_iter()
            .map(|uri| {
                let uri = uri.as_ref();
                uri.to_str().map(str::to_string).ok_or_else(|| {
                    ExtensionError::InvalidInputType(format!(
                        "cannot build an image URI from non UTF-8 path {}",
                        uri.display()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_string_array(StringArray::from(uris))
    }

    /// Create an image URI array from a string array, validating every non-null entry.
    ///
    /// # Errors
    /// Returns [`ExtensionError::InvalidUri`] identifying the first invalid URI.
    pub fn from_string_array(uris: StringArray) -> Result<Self, ExtensionError> {
        uris.iter().flatten().try_for_each(validate_uri)?;
        Self::from_storage(ImageUriType, Arc::new(uris))
    }

    /// Returns the URIs.
    #[must_use]
    pub fn uris(&self) -> &StringArray {
        self.storage().as_string::<i32>()
    }

    /// Read the images referenced by the URIs with the default [`FileSystemResolver`].
    ///
    /// See [`ImageUriArray::read_uris_with`].
    ///
    /// # Errors
    /// Returns an [`ExtensionError`] if a URI cannot be resolved or read.
    pub fn read_uris(&self) -> Result<EncodedImageArray, ExtensionError> {
        self.read_uris_with(&FileSystemResolver::default())
    }

    /// Read the images referenced by the URIs into an encoded image array.
    ///
    /// URIs are read sequentially in array order. Each input stream is closed before the next URI is read.
    /// Null URIs produce null images.
    ///
    /// # Errors
    /// Returns an [`ExtensionError`] on the first URI that cannot be resolved or read, remaining URIs are not read.
    pub fn read_uris_with(
        &self,
        resolver: &FileSystemResolver,
    ) -> Result<EncodedImageArray, ExtensionError> {
        let mut images = Vec::with_capacity(self.len());
        for uri in self.uris() {
            let image = match uri {
                Some(uri) => {
                    let (filesystem, path) = resolver.resolve(uri)?;
                    log::trace!("reading image {uri} from {filesystem:?}");
                    Some(filesystem.read(&path)?)
                }
                None => None,
            };
            images.push(image);
        }
        let images: ArrayRef = Arc::new(images.into_iter().collect::<BinaryArray>());
        EncodedImageArray::from_storage(super::EncodedImageType, images)
    }
}

impl<'a> ImageUriScalar<'a> {
    /// Returns the URI, or [`None`] if null.
    #[must_use]
    pub fn as_native(&self) -> Option<&'a str> {
        let uris = self.storage().as_string::<i32>();
        (!self.is_null()).then(|| uris.value(self.index()))
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Mutex};

    use lance_arrow_filesystem::{FileSystem, FileSystemError, InputStream, MemoryFileSystem};

    use super::*;

    /// Records every path opened on an in-memory filesystem.
    #[derive(Debug, Default)]
    struct RecordingFileSystem {
        files: MemoryFileSystem,
        opened: Mutex<Vec<String>>,
    }

    impl FileSystem for RecordingFileSystem {
        fn open_input_stream(&self, path: &str) -> Result<InputStream<'_>, FileSystemError> {
            self.opened.lock().unwrap().push(path.to_string());
            self.files.open_input_stream(path)
        }
    }

    #[test]
    fn image_uri_supported_schemes() {
        for uri in [
            "file:///a.png",
            "s3://bucket/b.png",
            "gs://bucket/c.png",
            "/absolute/d.png",
            "relative/e.png",
        ] {
            assert!(validate_uri(uri).is_ok(), "{uri}");
        }
    }

    #[test]
    fn image_uri_unsupported_schemes() {
        for uri in ["ftp://x/y", "http://host/a.png", "mailto:someone"] {
            assert!(
                matches!(
                    validate_uri(uri),
                    Err(ExtensionError::InvalidUri { reason: "is not a supported scheme", .. })
                ),
                "{uri}"
            );
        }
        for uri in ["http://[::1", "s3://my bucket/a.png"] {
            assert!(
                matches!(
                    validate_uri(uri),
                    Err(ExtensionError::InvalidUri { reason: "is not a valid URI", .. })
                ),
                "{uri}"
            );
        }
        assert!(validate_uri("s3://bucket/dir/a b \u{e9}.png").is_ok());
    }

    #[test]
    fn image_uri_from_uris() {
        let array = ImageUriArray::from_uris(["file:///a.png", "s3://bucket/b.png"]).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.extension_type().name(), "lance.arrow.image_uri");
        assert_eq!(array.scalar(1).unwrap().as_native(), Some("s3://bucket/b.png"));
        assert!(array.scalar(2).is_none());

        let paths = vec![PathBuf::from("/a.png"), PathBuf::from("b.png")];
        let array = ImageUriArray::from_uris(&paths).unwrap();
        let uris: Vec<_> = array.iter().map(|uri| uri.as_native()).collect();
        assert_eq!(uris, vec![Some("/a.png"), Some("b.png")]);
    }

    #[test]
    fn image_uri_rejects_batch() {
        let result = ImageUriArray::from_uris(["file:///a.png", "ftp://x/y"]);
        assert!(matches!(
            result,
            Err(ExtensionError::InvalidUri { uri, .. }) if uri == "ftp://x/y"
        ));
    }

    #[test]
    fn image_uri_null_entries() {
        let uris = StringArray::from(vec![Some("/a.png"), None]);
        let array = ImageUriArray::from_string_array(uris).unwrap();
        assert_eq!(array.null_count(), 1);
        assert_eq!(array.scalar(1).unwrap().as_native(), None);
    }

    #[test]
    fn image_uri_read_stops_at_first_failure() {
        let bucket = Arc::new(RecordingFileSystem::default());
        bucket.files.put("bucket/a.png", b"a".to_vec());
        bucket.files.put("bucket/c.png", b"c".to_vec());
        let mut resolver = FileSystemResolver::empty();
        resolver.register("s3", bucket.clone());

        let uris = ImageUriArray::from_uris([
            "s3://bucket/a.png",
            "s3://bucket/b.png",
            "s3://bucket/c.png",
        ])
        .unwrap();
        let Err(ExtensionError::FileSystem(FileSystemError::NotFound(path))) =
            uris.read_uris_with(&resolver)
        else {
            panic!("expected the second image to be missing");
        };
        assert_eq!(path, "bucket/b.png");
        assert_eq!(
            *bucket.opened.lock().unwrap(),
            vec!["bucket/a.png".to_string(), "bucket/b.png".to_string()]
        );

        let images = ImageUriArray::from_uris(["s3://bucket/a.png", "s3://bucket/c.png"])
            .unwrap()
            .read_uris_with(&resolver)
            .unwrap();
        assert_eq!(images.scalar(1).unwrap().as_native(), Some(b"c".as_slice()));
    }

    #[test]
    fn image_uri_read_percent_encoded_key() {
        let bucket = Arc::new(MemoryFileSystem::new());
        bucket.put("bucket/a b.png", b"spaced".to_vec());
        let mut resolver = FileSystemResolver::empty();
        resolver.register("s3", bucket);

        let images = ImageUriArray::from_uris(["s3://bucket/a b.png"])
            .unwrap()
            .read_uris_with(&resolver)
            .unwrap();
        assert_eq!(
            images.scalar(0).unwrap().as_native(),
            Some(b"spaced".as_slice())
        );
    }

    #[test]
    fn image_uri_storage_mismatch() {
        let storage: ArrayRef = Arc::new(BinaryArray::from_vec(vec![b"a".as_slice()]));
        assert!(matches!(
            ImageUriArray::from_storage(ImageUriType, storage),
            Err(ExtensionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn image_uri_deserialize() {
        let deserialized = ImageUriType.deserialize(&DataType::Utf8, b"").unwrap();
        assert_eq!(deserialized.name(), ImageUriType::NAME);
        assert!(ImageUriType.deserialize(&DataType::Binary, b"").is_err());
    }
}
