use arrow_schema::{ArrowError, DataType};
use lance_arrow_filesystem::FileSystemError;
use thiserror::Error;

use super::Dtype;

/// An extension type error.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// An input of the wrong kind was passed to a constructor.
    #[error("invalid input type: {0}")]
    InvalidInputType(String),
    /// A malformed URI, or a URI with a scheme that is not supported.
    #[error("URI {uri} {reason}")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Why the URI was rejected.
        reason: &'static str,
    },
    /// A storage type does not match the storage type required by an extension type.
    #[error("extension type {extension} requires storage type {expected}, got {found}")]
    TypeMismatch {
        /// The extension type name.
        extension: String,
        /// The required storage type.
        expected: String,
        /// The offending storage type.
        found: DataType,
    },
    /// Malformed extension metadata or image bytes.
    #[error("decode error: {0}")]
    Decode(String),
    /// Inconsistent dense buffer shapes.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// An image could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
    /// No image decoder was supplied and none is available.
    #[error("no image decoder is available, enable the `image` feature or pass a decoder")]
    NoDecoderAvailable,
    /// A dense buffer element type does not match the required element type.
    #[error("incompatible dtype {found}, expected {expected}")]
    IncompatibleDtype {
        /// The required element type.
        expected: Dtype,
        /// The offending element type.
        found: Dtype,
    },
    /// A null was encountered where a dense view is required.
    #[error("cannot convert an array with {0} null values to a dense buffer")]
    NullValuesPresent(usize),
    /// A zero-copy view was requested but the storage buffer cannot be reinterpreted in place.
    #[error("a zero-copy conversion is not possible: {0}")]
    ZeroCopyUnavailable(String),
    /// An index was out of bounds.
    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The array length.
        len: usize,
    },
    /// No extension type is registered with the name.
    #[error("unknown extension type {0}")]
    UnknownExtensionType(String),
    /// A different extension type is already registered with the name.
    #[error("a different extension type is already registered as {0}")]
    RegistryConflict(String),
    /// A filesystem error.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),
    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// An Arrow error.
    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl ExtensionError {
    /// Create a [`ExtensionError::TypeMismatch`] error.
    #[must_use]
    pub fn type_mismatch(
        extension: &str,
        expected: impl ToString,
        found: &DataType,
    ) -> Self {
        Self::TypeMismatch {
            extension: extension.to_string(),
            expected: expected.to_string(),
            found: found.clone(),
        }
    }
}

impl From<ndarray::ShapeError> for ExtensionError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::ShapeMismatch(err.to_string())
    }
}
